use bytes::Bytes;
use chrono::Utc;
use department_selection_database::models::ReportData;
use headers::ContentType;
use http::header::CONTENT_DISPOSITION;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use serde::Deserialize;

use super::{ok, query};
use crate::error::AppError;
use crate::report::{self, ReportKind};
use crate::{AppState, ResponseTypedHeaderExt as _};

#[derive(Deserialize, Default)]
pub struct ReportQuery {
    #[serde(default, rename = "type")]
    pub kind: ReportKind,
}

pub async fn report(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let ReportQuery { kind } = query(request)?;
    let ReportData {
        departments,
        members,
    } = state.repository.report_data().await?;
    match kind {
        ReportKind::Department => ok(&report::by_department(&departments, &members)),
        ReportKind::Member => ok(&report::by_member(&departments, &members)),
    }
}

/// The same report as a CSV download.
pub async fn export(
    request: &Request<Bytes>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let ReportQuery { kind } = query(request)?;
    let ReportData {
        departments,
        members,
    } = state.repository.report_data().await?;
    let csv = match kind {
        ReportKind::Department => {
            report::department_csv(&report::by_department(&departments, &members))?
        }
        ReportKind::Member => report::member_csv(&report::by_member(&departments, &members))?,
    };

    let file_name = kind.file_name(Utc::now().date_naive());
    Ok(Response::builder()
        .status(StatusCode::OK)
        .typed_header(ContentType::from(mime::TEXT_CSV_UTF_8))
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Full::new(Bytes::from(csv)))?)
}
