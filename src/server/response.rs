//! HTTP rendering of scrape results

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::types::ScrapeResult;

impl IntoResponse for ScrapeResult {
    /// Status comes from `meta.status`, body is the result itself
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.meta.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
