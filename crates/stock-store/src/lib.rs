//! Storage for the linen stock ledger: per-item counters, the append-only
//! movement log, extra deliveries and read-only reference data.
//!
//! Two backends implement [`StockStore`]: [`InMemoryStockStore`] and
//! [`PostgresStockStore`].

pub mod counters;
pub mod delivery;
pub mod error;
pub mod memory;
pub mod movement;
pub mod postgres;
pub mod query;
pub mod reference;
pub mod store;

pub use common::{ActorId, CatalogItemId, CorrelationId, DeliveryId, MovementId, RoomId};
pub use counters::{Bucket, StockCounters};
pub use delivery::{DEFAULT_DELIVERY_REASON, ExtraDelivery};
pub use error::{Result, StoreError};
pub use memory::{InMemoryReferenceStore, InMemoryStockStore};
pub use movement::{MovementKind, MovementOrigin, MovementRecord, Transition};
pub use postgres::PostgresStockStore;
pub use query::MovementQuery;
pub use reference::{CatalogItem, Room, RoomLinenRequirement, RoomStatus, RoomType};
pub use store::{AppliedCommit, Commit, MovementStream, ReferenceStore, StockStore, StockStoreExt};
