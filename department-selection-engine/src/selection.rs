use crate::constraints::CategoryTally;
use crate::directory::{CategoryEntry, DepartmentId, Directory, GlobalLimit};

/// Outcome of [`SelectionState::toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Deselected,
    /// Appended, after evicting the oldest choices of a full category.
    Selected { evicted: Vec<DepartmentId> },
    /// Unknown department or the global cap is reached.
    Blocked,
}

/// The chosen departments of one member while the form is being filled in.
///
/// This only gives feedback, the validator has the final word.
#[derive(Debug, Clone)]
pub struct SelectionState {
    directory: Directory,
    limit: GlobalLimit,
    // insertion order decides which choice is evicted
    chosen: Vec<DepartmentId>,
}

impl SelectionState {
    #[must_use]
    pub const fn new(directory: Directory, limit: GlobalLimit) -> Self {
        Self {
            directory,
            limit,
            chosen: Vec::new(),
        }
    }

    #[must_use]
    pub fn chosen(&self) -> &[DepartmentId] {
        &self.chosen
    }

    #[must_use]
    pub const fn directory(&self) -> &Directory {
        &self.directory
    }

    #[must_use]
    pub const fn limit(&self) -> GlobalLimit {
        self.limit
    }

    #[must_use]
    pub fn is_chosen(&self, department: DepartmentId) -> bool {
        self.chosen.contains(&department)
    }

    /// Swaps in newer directory data and keeps the current choices, even those
    /// that are no longer valid.
    pub fn refresh(&mut self, directory: Directory, limit: GlobalLimit) {
        self.directory = directory;
        self.limit = limit;
    }

    pub fn toggle(&mut self, department: DepartmentId) -> Toggle {
        if let Some(position) = self.chosen.iter().position(|chosen| *chosen == department) {
            self.chosen.remove(position);
            return Toggle::Deselected;
        }
        if !self.directory.contains(department) {
            return Toggle::Blocked;
        }

        // evict on a copy so a blocked attempt leaves the state untouched
        let mut next = self.chosen.clone();
        let mut evicted = Vec::new();
        if let Some(category) = self.directory.category_of(department) {
            while CategoryTally::new(&self.directory, &next).count(category.id)
                >= category.max_selections.as_usize()
            {
                match oldest_in(&self.directory, &next, category) {
                    Some(position) => evicted.push(next.remove(position)),
                    None => break,
                }
            }
        }

        // the category slot is swapped freely but the global cap never evicts
        if next.len() >= self.limit.as_usize() {
            return Toggle::Blocked;
        }

        next.push(department);
        self.chosen = next;
        Toggle::Selected { evicted }
    }

    #[must_use]
    pub fn is_selectable(&self, department: DepartmentId) -> bool {
        if self.is_chosen(department) {
            return true;
        }
        if !self.directory.contains(department) || self.chosen.len() >= self.limit.as_usize() {
            return false;
        }
        self.directory
            .category_of(department)
            .map_or(true, |category| self.tally().has_room(category))
    }

    fn tally(&self) -> CategoryTally {
        CategoryTally::new(&self.directory, &self.chosen)
    }
}

fn oldest_in(
    directory: &Directory,
    chosen: &[DepartmentId],
    category: &CategoryEntry,
) -> Option<usize> {
    chosen.iter().position(|department| {
        directory
            .category_of(*department)
            .is_some_and(|owner| owner.id == category.id)
    })
}
