use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use serde::Deserialize;
use tracing::info;

use super::{ok, read_json, Success};
use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateSetting {
    pub key: String,
    pub value: String,
}

/// Every stored setting as a flat key to value object.
pub async fn list(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    ok(&state.repository.list_settings().await?)
}

pub async fn update(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let UpdateSetting { key, value } = read_json(request)?;
    state.repository.put_setting(&key, &value).await?;
    info!(key = %key, "updated setting");
    ok(&Success::OK)
}
