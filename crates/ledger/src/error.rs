//! Ledger error types.

use common::{CatalogItemId, DeliveryId, RoomId};
use stock_store::{Bucket, StoreError};
use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// A multi-item change is always a single store commit, so there is no
/// partially applied outcome to report.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The catalog item has no counters.
    #[error("Unknown catalog item: {0}")]
    UnknownItem(CatalogItemId),

    /// The room is not known to the store.
    #[error("Unknown room: {0}")]
    UnknownRoom(RoomId),

    /// Quantities must be strictly positive.
    #[error("Invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity {
        item_id: CatalogItemId,
        quantity: u32,
    },

    /// Not enough available stock.
    #[error("Insufficient available stock for item {item_id}: requested {requested}, available {held}")]
    InsufficientStock {
        item_id: CatalogItemId,
        requested: u32,
        held: u32,
    },

    /// Not enough units in use.
    #[error("Insufficient in-use stock for item {item_id}: requested {requested}, in use {held}")]
    InsufficientInUse {
        item_id: CatalogItemId,
        requested: u32,
        held: u32,
    },

    /// Not enough dirty units.
    #[error("Insufficient dirty stock for item {item_id}: requested {requested}, dirty {held}")]
    InsufficientDirty {
        item_id: CatalogItemId,
        requested: u32,
        held: u32,
    },

    /// A counter would exceed its maximum value.
    #[error("Counter overflow for item {0}")]
    CounterOverflow(CatalogItemId),

    /// A delivery the batch meant to collect was collected by another
    /// commit first. Nothing was written.
    #[error("Delivery {0} was already collected")]
    AssignmentChanged(DeliveryId),

    /// The batch is malformed (empty, deliveries without a room).
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// The store could not be reached; nothing was written.
    ///
    /// Any other store failure, including one while committing, maps to
    /// `Storage` and is not safe to retry blindly.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other store failure.
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl LedgerError {
    /// Returns true if the operation may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageUnavailable(_))
    }

    /// Returns the catalog item the failure is about, if any.
    pub fn item_id(&self) -> Option<CatalogItemId> {
        match self {
            LedgerError::UnknownItem(id) | LedgerError::CounterOverflow(id) => Some(*id),
            LedgerError::InvalidQuantity { item_id, .. }
            | LedgerError::InsufficientStock { item_id, .. }
            | LedgerError::InsufficientInUse { item_id, .. }
            | LedgerError::InsufficientDirty { item_id, .. } => Some(*item_id),
            _ => None,
        }
    }

    /// Short label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::UnknownItem(_) => "unknown_item",
            LedgerError::UnknownRoom(_) => "unknown_room",
            LedgerError::InvalidQuantity { .. } => "invalid_quantity",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::InsufficientInUse { .. } => "insufficient_in_use",
            LedgerError::InsufficientDirty { .. } => "insufficient_dirty",
            LedgerError::CounterOverflow(_) => "counter_overflow",
            LedgerError::AssignmentChanged(_) => "assignment_changed",
            LedgerError::InvalidBatch(_) => "invalid_batch",
            LedgerError::StorageUnavailable(_) => "storage_unavailable",
            LedgerError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownItem(id) => LedgerError::UnknownItem(id),
            StoreError::UnknownRoom(id) => LedgerError::UnknownRoom(id),
            StoreError::Underflow {
                item_id,
                bucket,
                requested,
                held,
            } => match bucket {
                Bucket::Available => LedgerError::InsufficientStock {
                    item_id,
                    requested,
                    held,
                },
                Bucket::InUse => LedgerError::InsufficientInUse {
                    item_id,
                    requested,
                    held,
                },
                Bucket::Dirty => LedgerError::InsufficientDirty {
                    item_id,
                    requested,
                    held,
                },
            },
            StoreError::Overflow(id) => LedgerError::CounterOverflow(id),
            StoreError::InvalidCommit(message) => LedgerError::InvalidBatch(message),
            StoreError::StaleDelivery(id) => LedgerError::AssignmentChanged(id),
            e if e.is_unavailable() => LedgerError::StorageUnavailable(e.to_string()),
            e => LedgerError::Storage(e),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
