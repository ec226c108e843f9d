//! History error types.

use thiserror::Error;

/// Errors that can occur while reading or replaying the movement log.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// An error occurred in the stock store.
    #[error("Stock store error: {0}")]
    Store(#[from] stock_store::StoreError),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),

    /// Commits kept landing while the audit replayed the log.
    #[error("Stock kept changing during the audit ({attempts} attempts)")]
    Unsettled { attempts: usize },
}

impl HistoryError {
    /// Returns true if the read may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            HistoryError::Store(e) => e.is_unavailable(),
            HistoryError::Unsettled { .. } => true,
            HistoryError::Projection(_) => false,
        }
    }
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
