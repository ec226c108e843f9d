use common::{CatalogItemId, DeliveryId, RoomId};
use thiserror::Error;

use crate::Bucket;

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No counters row exists for the catalog item.
    #[error("Unknown catalog item: {0}")]
    UnknownItem(CatalogItemId),

    /// The room is not present in the reference data.
    #[error("Unknown room: {0}")]
    UnknownRoom(RoomId),

    /// A transition would take a bucket below zero.
    #[error(
        "Insufficient {bucket} stock for item {item_id}: requested {requested}, held {held}"
    )]
    Underflow {
        item_id: CatalogItemId,
        bucket: Bucket,
        requested: u32,
        held: u32,
    },

    /// A transition would overflow a counter.
    #[error("Counter overflow for item {0}")]
    Overflow(CatalogItemId),

    /// The commit was rejected before touching storage.
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    /// A delivery the commit meant to collect is gone or already collected.
    #[error("Delivery {0} is no longer outstanding")]
    StaleDelivery(DeliveryId),

    /// A persisted row could not be mapped back into a domain value.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The transaction failed while committing; it may or may not have been
    /// applied.
    #[error("Commit outcome unknown: {0}")]
    CommitOutcomeUnknown(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true when the store could not be reached, so nothing was
    /// written and the operation can be retried without risk of double
    /// application.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => is_transport_error(e),
            _ => false,
        }
    }
}

/// Connection and pool failures. Anything the server answered, and any
/// failure while committing, is not one.
fn is_transport_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        // SQLSTATE class 08: connection exception
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code.starts_with("08")),
        _ => false,
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
