use core::fmt::{self, Display};
use core::num::NonZeroU32;
use core::str::FromStr;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub i32);

impl Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// How many departments may be picked from one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionLimit(NonZeroU32);

impl SelectionLimit {
    pub const ONE: Self = Self(NonZeroU32::MIN);

    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Database columns are signed, anything below one is not a limit.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        u32::try_from(value).ok().and_then(Self::new)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0.get()).unwrap_or(usize::MAX)
    }
}

impl Default for SelectionLimit {
    fn default() -> Self {
        Self::ONE
    }
}

impl Display for SelectionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The global cap on departments per member (`maxDepartments`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalLimit(NonZeroU32);

impl GlobalLimit {
    pub const SETTING_KEY: &'static str = "maxDepartments";

    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Reads the stored setting, falling back when it is missing or not a
    /// positive integer.
    #[must_use]
    pub fn from_setting(value: Option<&str>, fallback: Self) -> Self {
        match value {
            None => fallback,
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value,
                    %fallback,
                    "ignoring invalid {} setting",
                    Self::SETTING_KEY
                );
                fallback
            }),
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0.get()).unwrap_or(usize::MAX)
    }
}

impl From<NonZeroU32> for GlobalLimit {
    fn from(value: NonZeroU32) -> Self {
        Self(value)
    }
}

impl FromStr for GlobalLimit {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<NonZeroU32>().map(Self)
    }
}

impl Display for GlobalLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub id: DepartmentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntry {
    pub id: CategoryId,
    pub name: String,
    pub max_selections: SelectionLimit,
    pub departments: Vec<DepartmentEntry>,
}

/// Where a department sits in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Categorized(CategoryId),
    Uncategorized,
}

/// Snapshot of all categories and departments, read fresh for every
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    categories: Vec<CategoryEntry>,
    uncategorized: Vec<DepartmentEntry>,
    placements: HashMap<DepartmentId, Placement>,
    category_positions: HashMap<CategoryId, usize>,
}

impl Directory {
    /// A department listed twice keeps its first placement.
    #[must_use]
    pub fn new(categories: Vec<CategoryEntry>, uncategorized: Vec<DepartmentEntry>) -> Self {
        let mut placements = HashMap::new();
        let mut category_positions = HashMap::with_capacity(categories.len());
        for (position, category) in categories.iter().enumerate() {
            category_positions.insert(category.id, position);
            for department in &category.departments {
                placements
                    .entry(department.id)
                    .or_insert(Placement::Categorized(category.id));
            }
        }
        for department in &uncategorized {
            placements
                .entry(department.id)
                .or_insert(Placement::Uncategorized);
        }
        Self {
            categories,
            uncategorized,
            placements,
            category_positions,
        }
    }

    #[must_use]
    pub fn categories(&self) -> &[CategoryEntry] {
        &self.categories
    }

    #[must_use]
    pub fn uncategorized(&self) -> &[DepartmentEntry] {
        &self.uncategorized
    }

    #[must_use]
    pub fn placement(&self, department: DepartmentId) -> Option<Placement> {
        self.placements.get(&department).copied()
    }

    #[must_use]
    pub fn contains(&self, department: DepartmentId) -> bool {
        self.placements.contains_key(&department)
    }

    #[must_use]
    pub fn category(&self, id: CategoryId) -> Option<&CategoryEntry> {
        self.category_positions
            .get(&id)
            .and_then(|position| self.categories.get(*position))
    }

    /// The category owning `department`, `None` for uncategorized or unknown
    /// departments.
    #[must_use]
    pub fn category_of(&self, department: DepartmentId) -> Option<&CategoryEntry> {
        match self.placement(department)? {
            Placement::Categorized(category) => self.category(category),
            Placement::Uncategorized => None,
        }
    }

    #[must_use]
    pub fn department_count(&self) -> usize {
        self.placements.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CHOIR: DepartmentId = DepartmentId(1);
    pub const PRAISE_TEAM: DepartmentId = DepartmentId(2);
    pub const USHERING: DepartmentId = DepartmentId(3);
    pub const MUSIC: CategoryId = CategoryId(10);

    /// Music (pick one of Choir, Praise Team) plus uncategorized Ushering.
    pub fn music_directory() -> Directory {
        Directory::new(
            vec![CategoryEntry {
                id: MUSIC,
                name: "Music".to_owned(),
                max_selections: SelectionLimit::ONE,
                departments: vec![
                    DepartmentEntry {
                        id: CHOIR,
                        name: "Choir".to_owned(),
                    },
                    DepartmentEntry {
                        id: PRAISE_TEAM,
                        name: "PraiseTeam".to_owned(),
                    },
                ],
            }],
            vec![DepartmentEntry {
                id: USHERING,
                name: "Ushering".to_owned(),
            }],
        )
    }

    #[test]
    fn resolves_placements() {
        let directory = music_directory();
        assert_eq!(
            directory.placement(CHOIR),
            Some(Placement::Categorized(MUSIC))
        );
        assert_eq!(directory.placement(USHERING), Some(Placement::Uncategorized));
        assert_eq!(directory.placement(DepartmentId(99)), None);
        assert_eq!(directory.category_of(PRAISE_TEAM).map(|c| c.id), Some(MUSIC));
        assert!(directory.category_of(USHERING).is_none());
        assert_eq!(directory.department_count(), 3);
    }

    #[test]
    fn global_limit_falls_back_on_garbage() {
        let fallback = GlobalLimit::new(3).unwrap();
        assert_eq!(GlobalLimit::from_setting(None, fallback), fallback);
        assert_eq!(GlobalLimit::from_setting(Some("abc"), fallback), fallback);
        assert_eq!(GlobalLimit::from_setting(Some("0"), fallback), fallback);
        assert_eq!(
            GlobalLimit::from_setting(Some(" 5 "), fallback),
            GlobalLimit::new(5).unwrap()
        );
    }

    #[test]
    fn selection_limit_rejects_non_positive() {
        assert_eq!(SelectionLimit::from_i32(0), None);
        assert_eq!(SelectionLimit::from_i32(-2), None);
        assert_eq!(SelectionLimit::from_i32(2).map(SelectionLimit::get), Some(2));
    }

    #[test]
    fn category_serializes_camel_case() {
        let directory = music_directory();
        let json = serde_json::to_value(&directory.categories()[0]).unwrap();
        assert_eq!(json["maxSelections"], 1);
        assert_eq!(json["departments"][1]["name"], "PraiseTeam");
    }
}
