//! Core projection trait and position tracking.

use async_trait::async_trait;
use stock_store::MovementRecord;

use crate::Result;

/// Tracks how many movement records a projection has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub records_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self {
            records_processed: 0,
        }
    }

    /// Advances the position by one record.
    pub fn advance(&self) -> Self {
        Self {
            records_processed: self.records_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.records_processed)
    }
}

/// A projection folds movement records, oldest first, into a read model.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single movement record.
    async fn handle(&self, record: &MovementRecord) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
