//! HTTP route handlers.

pub mod health;
pub mod history;
pub mod laundry;
pub mod metrics;
pub mod rooms;
pub mod stock;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use std::str::FromStr;

use crate::error::ApiError;

/// Parses an id from a path segment or body field.
pub(crate) fn parse_id<T>(value: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}

/// Unwraps a JSON body, turning extractor rejections into 400s.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Maps a workflow or ledger failure, naming items through the catalog.
pub(crate) async fn explained<T, E, R>(result: Result<T, E>, reference: &R) -> Result<T, ApiError>
where
    E: Into<orchestrator::OrchestratorError>,
    R: stock_store::ReferenceStore + ?Sized,
{
    match result {
        Ok(value) => Ok(value),
        Err(e) => Err(ApiError::explain(e.into(), reference).await),
    }
}
