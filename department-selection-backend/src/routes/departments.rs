use bytes::Bytes;
use department_selection_database::models::DepartmentChange;
use department_selection_engine::{CategoryId, DepartmentId};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::Deserialize;

use super::{json_response, ok, query, read_json, required, Success};
use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartment {
    pub name: String,
    #[serde(default, alias = "category_id")]
    pub category_id: Option<CategoryId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartment {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default, alias = "category_id")]
    pub category_id: Option<CategoryId>,
}

#[derive(Deserialize)]
pub struct IdQuery {
    pub id: i32,
}

fn change(name: String, category_id: Option<CategoryId>) -> Result<DepartmentChange, AppError> {
    Ok(DepartmentChange {
        name: required(name, "Department name is required")?,
        category_id,
    })
}

/// The directory the selection form is built from.
pub async fn list(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    ok(&state.repository.directory().await?)
}

pub async fn create(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: CreateDepartment = read_json(request)?;
    let department = state
        .repository
        .create_department(change(payload.name, payload.category_id)?)
        .await?;
    json_response(StatusCode::CREATED, &department)
}

pub async fn update(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: UpdateDepartment = read_json(request)?;
    let department = state
        .repository
        .update_department(payload.id, change(payload.name, payload.category_id)?)
        .await?;
    ok(&department)
}

pub async fn delete(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let IdQuery { id } = query(request)?;
    state.repository.delete_department(DepartmentId(id)).await?;
    ok(&Success::OK)
}
