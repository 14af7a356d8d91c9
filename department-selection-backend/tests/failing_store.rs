//! A store whose writes fail after validation, the way a lost database
//! connection would.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use department_selection_backend::{handle, AppState};
use department_selection_config::Config;
use department_selection_database::models::{
    Category, CategoryChange, Department, DepartmentChange, DepartmentDirectory,
    DepartmentWithCategory, Member, MemberUpdate, MemberWithDepartments, ReportData,
};
use department_selection_database::{DatabaseError, MemoryRepository, Repository, RepositoryError};
use department_selection_engine::{
    validate_submission, CategoryId, DepartmentId, GlobalLimit, Submission,
};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt as _, Full};
use serde_json::{json, Value};

struct FailingWrites {
    inner: MemoryRepository,
    limit: GlobalLimit,
}

fn write_failed() -> RepositoryError {
    RepositoryError::Persistence(DatabaseError::Database(
        diesel::result::Error::RollbackTransaction,
    ))
}

#[async_trait]
impl Repository for FailingWrites {
    async fn directory(&self) -> Result<DepartmentDirectory, RepositoryError> {
        self.inner.directory().await
    }

    async fn create_category(&self, change: CategoryChange) -> Result<Category, RepositoryError> {
        self.inner.create_category(change).await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        change: CategoryChange,
    ) -> Result<Category, RepositoryError> {
        self.inner.update_category(id, change).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        self.inner.delete_category(id).await
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentWithCategory>, RepositoryError> {
        self.inner.list_departments().await
    }

    async fn create_department(
        &self,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        self.inner.create_department(change).await
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        self.inner.update_department(id, change).await
    }

    async fn delete_department(&self, id: DepartmentId) -> Result<(), RepositoryError> {
        self.inner.delete_department(id).await
    }

    async fn list_members(&self) -> Result<Vec<MemberWithDepartments>, RepositoryError> {
        self.inner.list_members().await
    }

    async fn report_data(&self) -> Result<ReportData, RepositoryError> {
        self.inner.report_data().await
    }

    async fn get_member(&self, id: i32) -> Result<MemberWithDepartments, RepositoryError> {
        self.inner.get_member(id).await
    }

    async fn find_member_by_phone(&self, phone: &str) -> Result<Member, RepositoryError> {
        self.inner.find_member_by_phone(phone).await
    }

    async fn delete_member(&self, id: i32) -> Result<(), RepositoryError> {
        self.inner.delete_member(id).await
    }

    async fn purge_members(&self) -> Result<usize, RepositoryError> {
        self.inner.purge_members().await
    }

    async fn create_member_with_selections(
        &self,
        submission: Submission,
    ) -> Result<Member, RepositoryError> {
        let directory = self.inner.directory().await?.to_directory();
        validate_submission(&directory, self.limit, submission)?;
        Err(write_failed())
    }

    async fn update_member(
        &self,
        _id: i32,
        _update: MemberUpdate,
    ) -> Result<MemberWithDepartments, RepositoryError> {
        Err(write_failed())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        self.inner.get_setting(key).await
    }

    async fn list_settings(&self) -> Result<BTreeMap<String, String>, RepositoryError> {
        self.inner.list_settings().await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.inner.put_setting(key, value).await
    }

    async fn seed(&self) -> Result<bool, RepositoryError> {
        self.inner.seed().await
    }
}

async fn call(state: &AppState, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let response = handle(request, state.clone()).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn failed_write_is_a_generic_server_error() {
    let config = Config::default();
    let limit = GlobalLimit::from(config.default_max_departments);
    let repository = FailingWrites {
        inner: MemoryRepository::new(limit),
        limit,
    };
    let ushering = repository
        .create_department(DepartmentChange {
            name: "Ushering".to_owned(),
            category_id: None,
        })
        .await
        .unwrap();
    let repository = Arc::new(repository);
    let state = AppState::new(repository.clone(), config);

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/submit",
        json!({
            "fullName": "Ada Obi",
            "phone": "0801",
            "address": "12 Church Road",
            "selectedDepartments": [ushering.id],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "Failed to store changes"}));
    assert!(repository.list_members().await.unwrap().is_empty());

    // rejections are still reported before anything is written
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/submit",
        json!({
            "fullName": "Ada Obi",
            "phone": "0801",
            "address": "12 Church Road",
            "selectedDepartments": [],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Please select at least one department");
}
