//! Orchestrator error types.

use common::{CatalogItemId, RoomId};
use ledger::LedgerError;
use stock_store::{ReferenceStore, StoreError};
use thiserror::Error;

use crate::state::CleaningState;

/// Errors that can occur while orchestrating cleanings, receptions and
/// deliveries.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A ledger operation was rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The room is not in the reference data.
    #[error("Unknown room: {0}")]
    UnknownRoom(RoomId),

    /// A batch request carried no items.
    #[error("Batch contains no items")]
    EmptyBatch,

    /// The cleaning state machine was driven out of order.
    #[error("Invalid cleaning state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: &'static str,
        actual: CleaningState,
    },
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        OrchestratorError::Ledger(LedgerError::from(e))
    }
}

impl OrchestratorError {
    /// Returns true if the operation may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::Ledger(e) if e.is_retryable())
    }

    /// Returns the catalog item the failure is about, if any.
    pub fn item_id(&self) -> Option<CatalogItemId> {
        match self {
            OrchestratorError::Ledger(e) => e.item_id(),
            _ => None,
        }
    }

    /// A message suitable for showing to staff, with item names resolved
    /// through the catalog.
    pub async fn user_message<R>(&self, reference: &R) -> String
    where
        R: ReferenceStore + ?Sized,
    {
        let name = match self.item_id() {
            Some(id) => match reference.catalog_item(id).await {
                Ok(Some(item)) => item.name,
                _ => id.to_string(),
            },
            None => String::new(),
        };

        match self {
            OrchestratorError::Ledger(LedgerError::InsufficientStock { requested, held, .. }) => {
                format!("Not enough {name} available: requested {requested}, only {held} available")
            }
            OrchestratorError::Ledger(LedgerError::InsufficientInUse { requested, held, .. }) => {
                format!("Not enough {name} in use: requested {requested}, only {held} in use")
            }
            OrchestratorError::Ledger(LedgerError::InsufficientDirty { requested, held, .. }) => {
                format!(
                    "Not enough {name} dirty: requested {requested}, only {held} at the laundry"
                )
            }
            OrchestratorError::Ledger(LedgerError::InvalidQuantity { .. }) => {
                format!("Quantity for {name} must be greater than zero")
            }
            OrchestratorError::Ledger(LedgerError::UnknownItem(_)) => {
                format!("Item {name} is not tracked in stock")
            }
            OrchestratorError::Ledger(LedgerError::CounterOverflow(_)) => {
                format!("Quantity for {name} is too large")
            }
            OrchestratorError::Ledger(LedgerError::AssignmentChanged(_)) => {
                "The room's linen changed during the cleaning, please try again".to_string()
            }
            OrchestratorError::Ledger(e) if e.is_retryable() => {
                "Stock storage is temporarily unavailable, please try again".to_string()
            }
            OrchestratorError::Ledger(LedgerError::UnknownRoom(_))
            | OrchestratorError::UnknownRoom(_) => "The room does not exist".to_string(),
            OrchestratorError::EmptyBatch => "Select at least one item".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
