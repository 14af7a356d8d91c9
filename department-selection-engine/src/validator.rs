//! The authoritative check of a submitted selection.
//!
//! Nothing here trusts what the form believed: the directory and the global
//! limit are passed in freshly read for every call, and the checks run in a
//! fixed order where the first failure wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constraints::CategoryTally;
use crate::directory::{DepartmentId, Directory, GlobalLimit};
use crate::error::ValidationError;
use crate::member::MemberDetails;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(flatten)]
    pub member: MemberDetails,
    #[serde(default, alias = "selected_departments")]
    pub selected_departments: Vec<DepartmentId>,
}

/// A submission that passed every check, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    pub member: MemberDetails,
    pub departments: Vec<DepartmentId>,
}

pub fn validate_submission(
    directory: &Directory,
    limit: GlobalLimit,
    submission: Submission,
) -> Result<AcceptedSubmission, ValidationError> {
    submission.member.validate()?;
    validate_selection(directory, limit, &submission.selected_departments)?;
    Ok(AcceptedSubmission {
        member: submission.member,
        departments: submission.selected_departments,
    })
}

pub fn validate_selection(
    directory: &Directory,
    limit: GlobalLimit,
    selected: &[DepartmentId],
) -> Result<(), ValidationError> {
    if selected.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    if selected.len() > limit.as_usize() {
        return Err(ValidationError::TooManySelections {
            selected: selected.len(),
            max: limit,
        });
    }

    let mut seen = HashSet::with_capacity(selected.len());
    if let Some(duplicate) = selected.iter().find(|department| !seen.insert(**department)) {
        return Err(ValidationError::DuplicateDepartment(*duplicate));
    }

    if let Some(unknown) = selected
        .iter()
        .find(|department| !directory.contains(**department))
    {
        return Err(ValidationError::UnknownDepartment(*unknown));
    }

    let tally = CategoryTally::new(directory, selected);
    if let Some(category) = tally.first_exceeded(directory) {
        return Err(ValidationError::CategoryLimitExceeded {
            category: category.name.clone(),
            max: category.max_selections,
        });
    }

    Ok(())
}
