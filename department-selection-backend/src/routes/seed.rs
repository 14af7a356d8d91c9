use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use serde::Serialize;

use super::ok;
use crate::error::AppError;
use crate::AppState;

#[derive(Serialize)]
struct Seeded {
    message: &'static str,
    seeded: bool,
}

pub async fn seed(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    let seeded = state.repository.seed().await?;
    ok(&Seeded {
        message: if seeded {
            "Database seeded successfully"
        } else {
            "Database already seeded"
        },
        seeded,
    })
}
