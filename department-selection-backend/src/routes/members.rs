use bytes::Bytes;
use department_selection_database::models::MemberUpdate;
use department_selection_engine::DepartmentId;
use http::{Request, Response};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::departments::IdQuery;
use super::submit::Submitted;
use super::{ok, query, read_json, Success};
use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct PhoneQuery {
    pub phone: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FoundMember {
    id: i32,
    full_name: String,
    phone: String,
}

#[derive(Serialize)]
struct Purged {
    success: bool,
    deleted: usize,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMember {
    #[serde(default, alias = "full_name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "selected_departments")]
    pub selected_departments: Option<Vec<DepartmentId>>,
}

impl From<UpdateMember> for MemberUpdate {
    fn from(value: UpdateMember) -> Self {
        Self {
            full_name: value.full_name,
            email: value.email,
            address: value.address,
            selected_departments: value.selected_departments,
        }
    }
}

pub async fn list(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    ok(&state.repository.list_members().await?)
}

pub async fn get(id: i32, state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    ok(&state.repository.get_member(id).await?)
}

pub async fn delete(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let IdQuery { id } = query(request)?;
    state.repository.delete_member(id).await?;
    ok(&Success::OK)
}

pub async fn purge(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    let deleted = state.repository.purge_members().await?;
    info!(deleted, "purged members");
    ok(&Purged {
        success: true,
        deleted,
    })
}

pub async fn lookup(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let PhoneQuery { phone } = query(request)?;
    let member = state.repository.find_member_by_phone(&phone).await?;
    ok(&FoundMember {
        id: member.id,
        full_name: member.full_name,
        phone: member.phone,
    })
}

pub async fn update(
    id: i32,
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let payload: UpdateMember = read_json(request)?;
    let member = state.repository.update_member(id, payload.into()).await?;
    info!(member = member.member.id, "updated member");
    ok(&Submitted::new(member.member.id))
}
