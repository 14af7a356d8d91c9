use bytes::Bytes;
use department_selection_database::models::CategoryChange;
use department_selection_engine::{CategoryId, SelectionLimit};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::Deserialize;

use super::departments::IdQuery;
use super::{json_response, ok, query, read_json, required, Success};
use crate::error::AppError;
use crate::AppState;

const fn one() -> i64 {
    1
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    pub name: String,
    #[serde(default = "one", alias = "max_selections")]
    pub max_selections: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default = "one", alias = "max_selections")]
    pub max_selections: i64,
}

fn change(name: String, max_selections: i64) -> Result<CategoryChange, AppError> {
    let max_selections = u32::try_from(max_selections)
        .ok()
        .and_then(SelectionLimit::new)
        .ok_or(AppError::BadRequest("maxSelections must be at least 1"))?;
    Ok(CategoryChange {
        name: required(name, "Category name is required")?,
        max_selections,
    })
}

pub async fn list(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    ok(&state.repository.list_categories().await?)
}

pub async fn create(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: CreateCategory = read_json(request)?;
    let category = state
        .repository
        .create_category(change(payload.name, payload.max_selections)?)
        .await?;
    json_response(StatusCode::CREATED, &category)
}

pub async fn update(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: UpdateCategory = read_json(request)?;
    let category = state
        .repository
        .update_category(payload.id, change(payload.name, payload.max_selections)?)
        .await?;
    ok(&category)
}

/// Departments of the category stay and become uncategorized.
pub async fn delete(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let IdQuery { id } = query(request)?;
    state.repository.delete_category(CategoryId(id)).await?;
    ok(&Success::OK)
}
