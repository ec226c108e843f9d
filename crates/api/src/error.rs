//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::CatalogItemId;
use history::HistoryError;
use ledger::LedgerError;
use orchestrator::OrchestratorError;
use stock_store::ReferenceStore;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// The stock cannot cover the request.
    #[error("{message}")]
    Conflict {
        message: String,
        item_id: Option<CatalogItemId>,
    },
    /// Storage is down; the request changed nothing and can be retried.
    #[error("{0}")]
    Unavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps an orchestrator failure, naming items through the catalog.
    pub async fn explain<R>(err: OrchestratorError, reference: &R) -> Self
    where
        R: ReferenceStore + ?Sized,
    {
        let message = err.user_message(reference).await;
        Self::classify(err, message)
    }

    fn classify(err: OrchestratorError, message: String) -> Self {
        match err {
            OrchestratorError::EmptyBatch => ApiError::BadRequest(message),
            OrchestratorError::UnknownRoom(_) => ApiError::NotFound(message),
            OrchestratorError::InvalidState { .. } => ApiError::Internal(message),
            OrchestratorError::Ledger(e) => match e {
                LedgerError::InvalidQuantity { .. } | LedgerError::InvalidBatch(_) => {
                    ApiError::BadRequest(message)
                }
                LedgerError::UnknownItem(_) | LedgerError::UnknownRoom(_) => {
                    ApiError::NotFound(message)
                }
                LedgerError::InsufficientStock { .. }
                | LedgerError::InsufficientInUse { .. }
                | LedgerError::InsufficientDirty { .. }
                | LedgerError::CounterOverflow(_) => ApiError::Conflict {
                    item_id: e.item_id(),
                    message,
                },
                LedgerError::AssignmentChanged(_) => ApiError::Conflict {
                    item_id: None,
                    message,
                },
                LedgerError::StorageUnavailable(_) => ApiError::Unavailable(message),
                LedgerError::Storage(_) => ApiError::Internal(message),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = matches!(self, ApiError::Unavailable(_));
        let item_id = match &self {
            ApiError::Conflict { item_id, .. } => *item_id,
            _ => None,
        };
        if let ApiError::Internal(ref msg) = self {
            tracing::error!(error = %msg, "internal server error");
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "retryable": retryable,
        });
        if let Some(id) = item_id {
            body["item_id"] = serde_json::json!(id);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let message = err.to_string();
        Self::classify(err, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        OrchestratorError::from(err).into()
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        if err.is_retryable() {
            ApiError::Unavailable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}
