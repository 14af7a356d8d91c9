use core::convert::Infallible;
use std::error::Error;

use bytes::Bytes;
use department_selection_config::ConfigError;
use department_selection_database::{DatabaseError, RepositoryError};
use headers::{ContentType, HeaderMapExt as _};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::{error, warn};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("Invalid request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid query string: {0}")]
    Query(#[from] serde_urlencoded::de::Error),
    #[error("Failed to read request body: {0}")]
    Body(#[source] Box<dyn Error + Send + Sync>),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("http error: {0}")]
    Http(#[from] http::Error),
    #[error("webserver error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("IO error: {0}")]
    File(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<Infallible> for AppError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Repository(
                RepositoryError::Rejected(_)
                | RepositoryError::UnknownCategory(_)
                | RepositoryError::InvalidSetting { .. },
            )
            | Self::Json(_)
            | Self::Query(_)
            | Self::Body(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Repository(RepositoryError::NotFound(_)) | Self::NotFound => {
                StatusCode::NOT_FOUND
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Repository(RepositoryError::Persistence(_))
            | Self::Encode(_)
            | Self::Csv(_)
            | Self::Http(_)
            | Self::Hyper(_)
            | Self::File(_)
            | Self::Database(_)
            | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors carry their reason, server errors only a generic
    /// message while the cause goes to the log.
    #[must_use]
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let detail = if status.is_server_error() {
            error!("{self:?}");
            if matches!(self, Self::Repository(RepositoryError::Persistence(_))) {
                self.to_string()
            } else {
                "Internal server error".to_owned()
            }
        } else {
            warn!(%status, "{self}");
            self.to_string()
        };

        let body = serde_json::to_vec(&ErrorBody { detail: &detail }).unwrap_or_default();
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().typed_insert(ContentType::json());
        response
    }
}

#[cfg(test)]
mod tests {
    use department_selection_database::Entity;
    use department_selection_engine::ValidationError;
    use http_body_util::BodyExt as _;

    use super::*;

    #[tokio::test]
    async fn validation_errors_are_bad_requests_with_detail() {
        let response =
            AppError::from(RepositoryError::Rejected(ValidationError::EmptySelection))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            &body[..],
            br#"{"detail":"Please select at least one department"}"#
        );
    }

    #[test]
    fn maps_errors_to_status() {
        assert_eq!(
            AppError::from(RepositoryError::NotFound(Entity::Member)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("Name is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn server_errors_hide_their_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let response = AppError::from(cause).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"detail":"Internal server error"}"#);
    }
}
