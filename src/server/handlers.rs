//! Route handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::debug;

use super::AppState;
use crate::error::ScrapeError;
use crate::types::{ScrapeRequest, ScrapeResult};
use crate::utils::constants::SERVICE_NAME;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "GET /health",
            "scrape": "POST /scrape",
        },
    }))
}

/// `POST /scrape`
///
/// Body rejections (bad JSON, wrong shapes, unknown selector kinds) are
/// answered as `422 validation_error` in the regular result shape.
pub async fn scrape(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected scrape body: {}", rejection.body_text());
            let err = ScrapeError::Validation(rejection.body_text());
            return ScrapeResult::failure("", &err, started.elapsed()).into_response();
        }
    };

    let url = request.url.clone();
    match state.service.scrape(request).await {
        Ok(result) => result.into_response(),
        Err(err) => ScrapeResult::failure(url, &err, started.elapsed()).into_response(),
    }
}
