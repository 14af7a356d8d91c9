pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod seed;

use std::collections::BTreeMap;

use async_trait::async_trait;
use department_selection_engine::{CategoryId, DepartmentId, GlobalLimit, Submission};
use diesel_async::pooled_connection::deadpool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, SimpleAsyncConnection as _};
pub use error::{DatabaseError, Entity, RepositoryError};
pub use memory::MemoryRepository;
use models::{
    Category, CategoryChange, CategoryWithDepartments, Department, DepartmentChange,
    DepartmentDirectory, DepartmentSummary, DepartmentWithCategory, Member, MemberUpdate,
    MemberWithDepartments, ReportData,
};
pub use postgres::PgRepository;

pub type Pool = deadpool::Pool<AsyncPgConnection>;

static SCHEMA: &str = include_str!("../sql/schema.sql");

pub const ADMIN_PASSWORD_KEY: &str = "adminPassword";

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

/// Creates the tables that do not exist yet.
pub async fn create_schema(pool: &Pool) -> Result<(), DatabaseError> {
    let mut connection = pool.get().await?;
    connection.batch_execute(SCHEMA).await?;
    Ok(())
}

/// Rejects setting values the selection rules cannot work with.
pub fn validate_setting(key: &str, value: &str) -> Result<(), RepositoryError> {
    if key.trim().is_empty() {
        return Err(RepositoryError::InvalidSetting {
            key: key.to_owned(),
            reason: "key must not be empty",
        });
    }
    if key == GlobalLimit::SETTING_KEY && value.parse::<GlobalLimit>().is_err() {
        return Err(RepositoryError::InvalidSetting {
            key: key.to_owned(),
            reason: "must be a whole number of at least 1",
        });
    }
    Ok(())
}

/// The store behind the selection form and the admin screens.
///
/// Implementations must run the validation of a submission and the writes it
/// causes as one atomic unit.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Categories with their departments and the uncategorized departments,
    /// read together.
    async fn directory(&self) -> Result<DepartmentDirectory, RepositoryError>;

    async fn list_categories(&self) -> Result<Vec<CategoryWithDepartments>, RepositoryError> {
        Ok(self.directory().await?.categories)
    }

    async fn list_uncategorized_departments(
        &self,
    ) -> Result<Vec<DepartmentSummary>, RepositoryError> {
        Ok(self.directory().await?.uncategorized)
    }

    async fn create_category(&self, change: CategoryChange) -> Result<Category, RepositoryError>;

    async fn update_category(
        &self,
        id: CategoryId,
        change: CategoryChange,
    ) -> Result<Category, RepositoryError>;

    /// Detaches the departments of the category instead of deleting them.
    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError>;

    async fn list_departments(&self) -> Result<Vec<DepartmentWithCategory>, RepositoryError>;

    async fn create_department(
        &self,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError>;

    async fn update_department(
        &self,
        id: DepartmentId,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError>;

    /// Also removes every selection of the department.
    async fn delete_department(&self, id: DepartmentId) -> Result<(), RepositoryError>;

    /// Newest members first.
    async fn list_members(&self) -> Result<Vec<MemberWithDepartments>, RepositoryError>;

    /// Every department and every member, newest first, from one read.
    async fn report_data(&self) -> Result<ReportData, RepositoryError>;

    async fn get_member(&self, id: i32) -> Result<MemberWithDepartments, RepositoryError>;

    /// Exact match first, then a match ignoring spaces and dashes.
    async fn find_member_by_phone(&self, phone: &str) -> Result<Member, RepositoryError>;

    async fn delete_member(&self, id: i32) -> Result<(), RepositoryError>;

    /// Returns how many members were deleted.
    async fn purge_members(&self) -> Result<usize, RepositoryError>;

    /// Validates against the current directory and limit and stores the member
    /// with one link per department, all or nothing.
    async fn create_member_with_selections(
        &self,
        submission: Submission,
    ) -> Result<Member, RepositoryError>;

    /// Replaces details and, if given, the whole selection of a member.
    async fn update_member(
        &self,
        id: i32,
        update: MemberUpdate,
    ) -> Result<MemberWithDepartments, RepositoryError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn list_settings(&self) -> Result<BTreeMap<String, String>, RepositoryError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), RepositoryError>;

    /// The limit in force right now, `fallback` while no valid setting exists.
    async fn global_limit(&self, fallback: GlobalLimit) -> Result<GlobalLimit, RepositoryError> {
        Ok(GlobalLimit::from_setting(
            self.get_setting(GlobalLimit::SETTING_KEY).await?.as_deref(),
            fallback,
        ))
    }

    /// Inserts the default settings and directory unless settings exist.
    /// Returns whether anything was inserted.
    async fn seed(&self) -> Result<bool, RepositoryError>;
}
