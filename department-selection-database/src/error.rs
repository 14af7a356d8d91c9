use core::fmt::{self, Display};

use department_selection_engine::{CategoryId, ValidationError};
use diesel_async::pooled_connection::deadpool;
use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Category,
    Department,
    Member,
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Category => "Category",
            Self::Department => "Department",
            Self::Member => "Member",
        })
    }
}

/// Everything a repository operation can fail with.
///
/// Only [`RepositoryError::Persistence`] can happen after writing started,
/// and it always comes with a rollback.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("Category {0} does not exist")]
    UnknownCategory(CategoryId),
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: &'static str },
    #[error("Failed to store changes")]
    Persistence(#[source] DatabaseError),
}

impl From<DatabaseError> for RepositoryError {
    fn from(value: DatabaseError) -> Self {
        Self::Persistence(value)
    }
}

impl From<diesel::result::Error> for RepositoryError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Persistence(value.into())
    }
}

impl From<deadpool::PoolError> for RepositoryError {
    fn from(value: deadpool::PoolError) -> Self {
        Self::Persistence(value.into())
    }
}
