use thiserror::Error;

use crate::directory::{DepartmentId, GlobalLimit, SelectionLimit};
use crate::member::RequiredField;

/// Why a submission was rejected. The messages are shown to the member.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingRequiredField(RequiredField),
    #[error("Please select at least one department")]
    EmptySelection,
    #[error("You can only select up to {max} departments")]
    TooManySelections { selected: usize, max: GlobalLimit },
    #[error("Department {0} was selected more than once")]
    DuplicateDepartment(DepartmentId),
    #[error("Department {0} does not exist")]
    UnknownDepartment(DepartmentId),
    #[error("You can only select up to {max} department(s) from '{category}'")]
    CategoryLimitExceeded {
        category: String,
        max: SelectionLimit,
    },
}
