pub mod categories;
pub mod departments;
pub mod members;
pub mod reports;
pub mod seed;
pub mod settings;
pub mod submit;

use bytes::Bytes;
use headers::ContentType;
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;
use crate::{AppState, ResponseTypedHeaderExt as _};

#[derive(Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Self = Self { success: true };
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Full<Bytes>>, AppError> {
    let body = serde_json::to_vec(value).map_err(AppError::Encode)?;
    Ok(Response::builder()
        .status(status)
        .typed_header(ContentType::json())
        .body(Full::new(Bytes::from(body)))?)
}

pub fn ok<T: Serialize>(value: &T) -> Result<Response<Full<Bytes>>, AppError> {
    json_response(StatusCode::OK, value)
}

pub fn read_json<T: DeserializeOwned>(request: &Request<Bytes>) -> Result<T, AppError> {
    Ok(serde_json::from_slice(request.body())?)
}

pub fn query<T: DeserializeOwned>(request: &Request<Bytes>) -> Result<T, AppError> {
    Ok(serde_urlencoded::from_str(
        request.uri().query().unwrap_or_default(),
    )?)
}

/// Names and similar free text must contain something besides whitespace.
pub fn required(value: String, message: &'static str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(message));
    }
    Ok(trimmed.to_owned())
}

pub async fn route(
    request: Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let path = request.uri().path().to_owned();
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let method = request.method().clone();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) => ok(&Health { status: "ok" }),

        (&Method::GET, ["api", "departments"]) => departments::list(state).await,
        (&Method::POST, ["api", "departments"]) => departments::create(&request, state).await,
        (&Method::PUT, ["api", "departments"]) => departments::update(&request, state).await,
        (&Method::DELETE, ["api", "departments"]) => departments::delete(&request, state).await,

        (&Method::GET, ["api", "categories"]) => categories::list(state).await,
        (&Method::POST, ["api", "categories"]) => categories::create(&request, state).await,
        (&Method::PUT, ["api", "categories"]) => categories::update(&request, state).await,
        (&Method::DELETE, ["api", "categories"]) => categories::delete(&request, state).await,

        (&Method::GET, ["api", "members"]) => members::list(state).await,
        (&Method::DELETE, ["api", "members"]) => members::delete(&request, state).await,
        (&Method::DELETE, ["api", "members", "purge"]) => members::purge(state).await,
        (&Method::GET, ["api", "members", "lookup"]) => members::lookup(&request, state).await,
        (&Method::GET, ["api", "members", id]) => members::get(parse_id(id)?, state).await,
        (&Method::PUT, ["api", "members", id]) => {
            members::update(parse_id(id)?, &request, state).await
        }

        (&Method::GET, ["api", "settings"]) => settings::list(state).await,
        (&Method::PUT, ["api", "settings"]) => settings::update(&request, state).await,

        (&Method::POST, ["api", "submit"]) => submit::submit(&request, state).await,

        (&Method::GET | &Method::POST, ["api", "seed"]) => seed::seed(state).await,

        (&Method::GET, ["api", "report"]) => reports::report(&request, state).await,
        (&Method::GET, ["api", "export"]) => reports::export(&request, state).await,

        (
            _,
            ["health"]
            | ["api", "departments" | "categories" | "members" | "settings" | "submit" | "seed"
                | "report" | "export"]
            | ["api", "members", _],
        ) => Err(AppError::MethodNotAllowed),
        _ => Err(AppError::NotFound),
    }
}

/// Unparsable ids cannot name anything.
fn parse_id(id: &str) -> Result<i32, AppError> {
    id.parse().map_err(|_| AppError::NotFound)
}
