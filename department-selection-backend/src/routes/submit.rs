use bytes::Bytes;
use department_selection_engine::Submission;
use http::{Request, Response};
use http_body_util::Full;
use serde::Serialize;

use super::{ok, read_json};
use crate::error::AppError;
use crate::AppState;

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub success: bool,
    pub member_id: i32,
}

impl Submitted {
    #[must_use]
    pub const fn new(member_id: i32) -> Self {
        Self {
            success: true,
            member_id,
        }
    }
}

/// Stores a member and their departments after checking them against the
/// current directory and limit.
pub async fn submit(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let submission: Submission = read_json(request)?;
    let member = state
        .repository
        .create_member_with_selections(submission)
        .await?;
    ok(&Submitted::new(member.id))
}
