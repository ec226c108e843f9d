use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CatalogItemId, CorrelationId, DeliveryId, RoomId};
use futures_core::Stream;

use crate::{
    CatalogItem, ExtraDelivery, MovementQuery, MovementRecord, Result, Room,
    RoomLinenRequirement, StockCounters, StoreError,
};

/// A stream of movement records.
pub type MovementStream = Pin<Box<dyn Stream<Item = Result<MovementRecord>> + Send>>;

/// Everything a single ledger operation writes, applied as one unit.
///
/// Timestamps on the records and deliveries are provisional: the store
/// replaces them with the time the commit is applied.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    /// Movement records, applied to the counters in order.
    pub records: Vec<MovementRecord>,

    /// Extra delivery rows recorded alongside the movements.
    pub deliveries: Vec<ExtraDelivery>,

    /// Outstanding deliveries to the records' room that this commit
    /// collects. Each must still be outstanding when the commit applies.
    pub reconciles: Vec<DeliveryId>,
}

impl Commit {
    pub fn new(records: Vec<MovementRecord>) -> Self {
        Self {
            records,
            deliveries: Vec::new(),
            reconciles: Vec::new(),
        }
    }

    pub fn with_deliveries(mut self, deliveries: Vec<ExtraDelivery>) -> Self {
        self.deliveries = deliveries;
        self
    }

    pub fn with_reconciled(mut self, reconciles: Vec<DeliveryId>) -> Self {
        self.reconciles = reconciles;
        self
    }

    /// Correlation key shared by the records.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.records.first().map(|r| r.correlation_id)
    }

    /// Room the records were made for.
    pub fn room_id(&self) -> Option<RoomId> {
        self.records.first().and_then(|r| r.room_id)
    }

    /// Sets the timestamp of every record and delivery.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        for record in &mut self.records {
            record.timestamp = at;
        }
        for delivery in &mut self.deliveries {
            delivery.delivered_at = at;
        }
    }

    /// Distinct items touched by the commit, in ascending id order.
    pub fn item_ids(&self) -> Vec<CatalogItemId> {
        let mut ids: Vec<_> = self.records.iter().map(|r| r.catalog_item_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// What a commit wrote, with the timestamps the store assigned.
#[derive(Debug, Clone)]
pub struct AppliedCommit {
    pub records: Vec<MovementRecord>,
    pub deliveries: Vec<ExtraDelivery>,

    /// Updated counters of the touched items, ascending by item id.
    pub counters: Vec<StockCounters>,
}

/// Storage for stock counters, the movement log and extra deliveries.
///
/// All implementations must be thread-safe (Send + Sync). Counters of one
/// item are never read-validated-written concurrently by two commits.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Creates zero counters for an item. Re-registering an existing item
    /// returns its current counters unchanged.
    async fn register_item(&self, catalog_item_id: CatalogItemId) -> Result<StockCounters>;

    /// Returns the counters of an item, or None if it was never registered.
    async fn counters(&self, catalog_item_id: CatalogItemId) -> Result<Option<StockCounters>>;

    /// Returns the counters of every registered item, ascending by item id.
    async fn all_counters(&self) -> Result<Vec<StockCounters>>;

    /// Applies a commit atomically.
    ///
    /// Either every record is applied and appended, every delivery stored
    /// and every reconciled delivery marked, or nothing is. Records are
    /// stamped while the commit's locks are held and never earlier than
    /// anything already in the log, so time order is commit order.
    async fn commit(&self, commit: Commit) -> Result<AppliedCommit>;

    /// Retrieves movement records matching a query, newest first.
    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<MovementRecord>>;

    /// Streams movement records matching a query, newest first.
    ///
    /// Each call starts a fresh sequence.
    async fn stream_movements(&self, query: MovementQuery) -> Result<MovementStream>;

    /// Extra deliveries made to a room, newest first.
    async fn deliveries_for_room(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>>;

    /// Extra deliveries to a room that no cleaning has collected yet,
    /// newest first.
    async fn outstanding_deliveries(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>>;

    /// The latest extra deliveries across all rooms.
    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<ExtraDelivery>>;
}

/// Extension trait providing convenience methods for stock stores.
#[async_trait]
pub trait StockStoreExt: StockStore {
    /// Checks if an item has counters.
    async fn item_exists(&self, catalog_item_id: CatalogItemId) -> Result<bool> {
        Ok(self.counters(catalog_item_id).await?.is_some())
    }

    /// Returns the newest record matching a query.
    async fn latest_movement(&self, query: MovementQuery) -> Result<Option<MovementRecord>> {
        let mut records = self.query_movements(query.offset(0).limit(1)).await?;
        Ok(records.pop())
    }
}

// Blanket implementation for all StockStore implementations
impl<T: StockStore + ?Sized> StockStoreExt for T {}

/// Read-only access to the catalog and rooms.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn catalog_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>>;

    /// All catalog items, ordered by name.
    async fn catalog_items(&self) -> Result<Vec<CatalogItem>>;

    async fn room(&self, id: RoomId) -> Result<Option<Room>>;

    /// All rooms, ordered by name.
    async fn rooms(&self) -> Result<Vec<Room>>;

    /// The base linen requirement of a room, ascending by item id.
    async fn room_requirements(&self, room_id: RoomId) -> Result<Vec<RoomLinenRequirement>>;
}

/// Validates a commit before touching storage.
pub fn validate_commit(commit: &Commit) -> Result<()> {
    let Some(first) = commit.records.first() else {
        return Err(StoreError::InvalidCommit(
            "Cannot commit an empty record list".to_string(),
        ));
    };

    for record in &commit.records {
        if record.quantity == 0 {
            return Err(StoreError::InvalidCommit(format!(
                "Record {} has a zero quantity",
                record.id
            )));
        }
        if record.correlation_id != first.correlation_id {
            return Err(StoreError::InvalidCommit(
                "All records must share one correlation key".to_string(),
            ));
        }
    }

    for delivery in &commit.deliveries {
        if delivery.quantity == 0 {
            return Err(StoreError::InvalidCommit(format!(
                "Delivery {} has a zero quantity",
                delivery.id
            )));
        }
        if delivery.correlation_id != first.correlation_id {
            return Err(StoreError::InvalidCommit(
                "Deliveries must share the records' correlation key".to_string(),
            ));
        }
    }

    if !commit.reconciles.is_empty() {
        if commit.room_id().is_none() {
            return Err(StoreError::InvalidCommit(
                "Reconciling deliveries requires a room".to_string(),
            ));
        }
        let mut ids = commit.reconciles.clone();
        ids.sort();
        ids.dedup();
        if ids.len() != commit.reconciles.len() {
            return Err(StoreError::InvalidCommit(
                "A delivery can only be reconciled once per commit".to_string(),
            ));
        }
    }

    Ok(())
}

/// Applies records in order to a scratch copy of the locked counters.
///
/// Returns the new counters of every item in `current`; the input is left
/// untouched so a failure has no effect.
pub fn apply_records(
    current: &BTreeMap<CatalogItemId, StockCounters>,
    records: &[MovementRecord],
) -> Result<BTreeMap<CatalogItemId, StockCounters>> {
    let mut scratch = current.clone();
    for record in records {
        let counters = scratch
            .get_mut(&record.catalog_item_id)
            .ok_or(StoreError::UnknownItem(record.catalog_item_id))?;
        *counters = counters.apply(record)?;
    }
    Ok(scratch)
}

/// Builds a lazy stream that pages through `query_movements`.
///
/// Honors the query's own offset and limit.
pub fn paged_stream<S>(store: S, query: MovementQuery, page_size: usize) -> MovementStream
where
    S: StockStore + 'static,
{
    use futures_util::{StreamExt, stream};

    let page_size = page_size.max(1);
    let start = query.offset.unwrap_or(0);
    let remaining = query.limit;

    let pages = stream::unfold(
        Some((store, query, start, remaining)),
        move |state| async move {
            let (store, query, offset, remaining) = state?;
            let take = remaining.map_or(page_size, |r| r.min(page_size));
            if take == 0 {
                return None;
            }

            match store
                .query_movements(query.clone().offset(offset).limit(take))
                .await
            {
                Ok(records) => {
                    let fetched = records.len();
                    let next = (fetched == take).then(|| {
                        (
                            store,
                            query,
                            offset + fetched,
                            remaining.map(|r| r - fetched),
                        )
                    });
                    let items: Vec<Result<MovementRecord>> =
                        records.into_iter().map(Ok).collect();
                    Some((stream::iter(items), next))
                }
                Err(e) => Some((stream::iter(vec![Err(e)]), None)),
            }
        },
    );

    Box::pin(pages.flatten())
}
