use std::collections::HashMap;

use itertools::Itertools as _;

use crate::directory::{CategoryEntry, CategoryId, DepartmentId, Directory, Placement};

/// Number of chosen departments per category.
///
/// Uncategorized and unknown departments are not counted, they only take part
/// in the global cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTally {
    counts: HashMap<CategoryId, usize>,
}

impl CategoryTally {
    pub fn new<'a>(
        directory: &Directory,
        departments: impl IntoIterator<Item = &'a DepartmentId>,
    ) -> Self {
        let counts = departments
            .into_iter()
            .filter_map(|department| match directory.placement(*department) {
                Some(Placement::Categorized(category)) => Some(category),
                Some(Placement::Uncategorized) | None => None,
            })
            .counts();
        Self { counts }
    }

    #[must_use]
    pub fn count(&self, category: CategoryId) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Whether one more department of `category` would stay within its limit.
    #[must_use]
    pub fn has_room(&self, category: &CategoryEntry) -> bool {
        self.count(category.id) < category.max_selections.as_usize()
    }

    /// The first category, in directory order, holding more departments than
    /// it allows.
    #[must_use]
    pub fn first_exceeded<'d>(&self, directory: &'d Directory) -> Option<&'d CategoryEntry> {
        directory
            .categories()
            .iter()
            .find(|category| self.count(category.id) > category.max_selections.as_usize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::tests::{music_directory, CHOIR, MUSIC, PRAISE_TEAM, USHERING};

    #[test]
    fn counts_only_categorized_departments() {
        let directory = music_directory();
        let tally = CategoryTally::new(&directory, &[CHOIR, USHERING, DepartmentId(42)]);
        assert_eq!(tally.count(MUSIC), 1);
        assert_eq!(tally.count(CategoryId(7)), 0);
        assert!(!tally.has_room(&directory.categories()[0]));
        assert!(tally.first_exceeded(&directory).is_none());
    }

    #[test]
    fn reports_exceeded_category() {
        let directory = music_directory();
        let tally = CategoryTally::new(&directory, &[CHOIR, PRAISE_TEAM]);
        assert_eq!(tally.first_exceeded(&directory).map(|c| c.id), Some(MUSIC));
    }
}
