//! Selection rules for choosing departments.
//!
//! The [`selection::SelectionState`] drives the interactive form: it keeps the
//! chosen departments in insertion order and evicts the oldest choice of a full
//! category. The [`validator`] is the authoritative gate that re-checks a
//! submitted selection against a fresh [`directory::Directory`].

pub mod constraints;
pub mod directory;
pub mod error;
pub mod member;
pub mod selection;
pub mod validator;

pub use constraints::CategoryTally;
pub use directory::{
    CategoryEntry, CategoryId, Directory, DepartmentEntry, DepartmentId, GlobalLimit, Placement,
    SelectionLimit,
};
pub use error::ValidationError;
pub use member::{normalize_phone, MemberDetails, RequiredField};
pub use selection::{SelectionState, Toggle};
pub use validator::{validate_selection, validate_submission, AcceptedSubmission, Submission};
