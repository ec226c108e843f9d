use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{CatalogItemId, RoomId};
use tokio::sync::{Mutex, RwLock};

use crate::{
    CatalogItem, ExtraDelivery, MovementQuery, MovementRecord, Result, Room,
    RoomLinenRequirement, StockCounters, StoreError,
    store::{
        AppliedCommit, Commit, MovementStream, ReferenceStore, StockStore, apply_records,
        validate_commit,
    },
};

/// In-memory stock store for tests and local runs.
///
/// Each item's counters sit behind their own mutex. A commit locks the
/// touched items in ascending id order and holds them for the whole
/// read-validate-write, so commits on disjoint items run in parallel.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    counters: Arc<RwLock<HashMap<CatalogItemId, Arc<Mutex<StockCounters>>>>>,
    movements: Arc<RwLock<Vec<MovementRecord>>>,
    deliveries: Arc<RwLock<Vec<ExtraDelivery>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the total number of movement records stored.
    pub async fn movement_count(&self) -> usize {
        self.movements.read().await.len()
    }

    /// Clears all counters, movements and deliveries.
    pub async fn clear(&self) {
        self.counters.write().await.clear();
        self.movements.write().await.clear();
        self.deliveries.write().await.clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    async fn room_deliveries(
        &self,
        room_id: RoomId,
        outstanding_only: bool,
    ) -> Result<Vec<ExtraDelivery>> {
        self.check_available()?;

        let deliveries = self.deliveries.read().await;
        let mut matching: Vec<_> = deliveries
            .iter()
            .filter(|d| d.room_id == room_id)
            .filter(|d| !outstanding_only || d.is_outstanding())
            .cloned()
            .collect();
        matching.reverse();
        matching.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at));
        Ok(matching)
    }

    async fn item_lock(&self, catalog_item_id: CatalogItemId) -> Result<Arc<Mutex<StockCounters>>> {
        self.counters
            .read()
            .await
            .get(&catalog_item_id)
            .cloned()
            .ok_or(StoreError::UnknownItem(catalog_item_id))
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn register_item(&self, catalog_item_id: CatalogItemId) -> Result<StockCounters> {
        self.check_available()?;

        let lock = {
            let mut counters = self.counters.write().await;
            counters
                .entry(catalog_item_id)
                .or_insert_with(|| Arc::new(Mutex::new(StockCounters::empty(catalog_item_id))))
                .clone()
        };

        let current = lock.lock().await.clone();
        Ok(current)
    }

    async fn counters(&self, catalog_item_id: CatalogItemId) -> Result<Option<StockCounters>> {
        self.check_available()?;

        let lock = self.counters.read().await.get(&catalog_item_id).cloned();
        match lock {
            Some(lock) => Ok(Some(lock.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn all_counters(&self) -> Result<Vec<StockCounters>> {
        self.check_available()?;

        let mut locks: Vec<_> = self
            .counters
            .read()
            .await
            .iter()
            .map(|(id, lock)| (*id, lock.clone()))
            .collect();
        locks.sort_by_key(|(id, _)| *id);

        let mut all = Vec::with_capacity(locks.len());
        for (_, lock) in locks {
            all.push(lock.lock().await.clone());
        }
        Ok(all)
    }

    async fn commit(&self, mut commit: Commit) -> Result<AppliedCommit> {
        self.check_available()?;
        validate_commit(&commit)?;

        // Ascending id order; every commit locks the same way, so no deadlock.
        let mut guards = Vec::new();
        for id in commit.item_ids() {
            let lock = self.item_lock(id).await?;
            guards.push((id, lock.lock_owned().await));
        }

        // Re-check after waiting on the locks so a store that went away
        // mid-commit writes nothing.
        self.check_available()?;

        let mut movements = self.movements.write().await;
        let mut deliveries = self.deliveries.write().await;

        // Stamped under the log lock: append order is time order.
        let now = match movements.last() {
            Some(last) => Utc::now().max(last.timestamp),
            None => Utc::now(),
        };
        commit.stamp(now);

        let current: BTreeMap<_, _> = guards
            .iter()
            .map(|(id, guard)| (*id, (**guard).clone()))
            .collect();
        let updated = apply_records(&current, &commit.records)?;

        let room_id = commit.room_id();
        let mut collected = Vec::with_capacity(commit.reconciles.len());
        for id in &commit.reconciles {
            let index = deliveries
                .iter()
                .position(|d| d.id == *id && Some(d.room_id) == room_id && d.is_outstanding())
                .ok_or(StoreError::StaleDelivery(*id))?;
            collected.push(index);
        }

        for (id, guard) in guards.iter_mut() {
            if let Some(next) = updated.get(&*id) {
                **guard = next.clone();
            }
        }
        let correlation_id = commit.correlation_id();
        for index in collected {
            deliveries[index].reconciled_by = correlation_id;
        }
        movements.extend(commit.records.iter().cloned());
        deliveries.extend(commit.deliveries.iter().cloned());

        Ok(AppliedCommit {
            records: commit.records,
            deliveries: commit.deliveries,
            counters: updated.into_values().collect(),
        })
    }

    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<MovementRecord>> {
        self.check_available()?;

        let movements = self.movements.read().await;
        // Newest first; insertion order breaks timestamp ties.
        let mut records: Vec<_> = movements
            .iter()
            .enumerate()
            .filter(|(_, r)| query.matches(r))
            .map(|(seq, r)| (seq, r.clone()))
            .collect();
        records.sort_by(|(seq_a, a), (seq_b, b)| {
            b.timestamp.cmp(&a.timestamp).then(seq_b.cmp(seq_a))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, r)| r)
            .collect())
    }

    async fn stream_movements(&self, query: MovementQuery) -> Result<MovementStream> {
        use futures_util::stream;

        let records = self.query_movements(query).await?;
        let stream = stream::iter(records.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn deliveries_for_room(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>> {
        self.room_deliveries(room_id, false).await
    }

    async fn outstanding_deliveries(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>> {
        self.room_deliveries(room_id, true).await
    }

    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<ExtraDelivery>> {
        self.check_available()?;

        let deliveries = self.deliveries.read().await;
        let mut recent: Vec<_> = deliveries.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.delivered_at.cmp(&a.delivered_at));
        recent.truncate(limit);
        Ok(recent)
    }
}

/// In-memory reference data with seeding methods.
#[derive(Clone, Default)]
pub struct InMemoryReferenceStore {
    items: Arc<RwLock<HashMap<CatalogItemId, CatalogItem>>>,
    rooms: Arc<RwLock<HashMap<RoomId, Room>>>,
    requirements: Arc<RwLock<BTreeMap<(RoomId, CatalogItemId), u32>>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog item.
    pub async fn upsert_item(&self, item: CatalogItem) {
        self.items.write().await.insert(item.id, item);
    }

    /// Inserts or replaces a room.
    pub async fn upsert_room(&self, room: Room) {
        self.rooms.write().await.insert(room.id, room);
    }

    /// Sets the base requirement of an item for a room. A zero quantity
    /// removes the requirement.
    pub async fn set_requirement(&self, room_id: RoomId, catalog_item_id: CatalogItemId, quantity: u32) {
        let mut requirements = self.requirements.write().await;
        if quantity == 0 {
            requirements.remove(&(room_id, catalog_item_id));
        } else {
            requirements.insert((room_id, catalog_item_id), quantity);
        }
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn catalog_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn catalog_items(&self) -> Result<Vec<CatalogItem>> {
        let mut items: Vec<_> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        Ok(self.rooms.read().await.get(&id).cloned())
    }

    async fn rooms(&self) -> Result<Vec<Room>> {
        let mut rooms: Vec<_> = self.rooms.read().await.values().cloned().collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    async fn room_requirements(&self, room_id: RoomId) -> Result<Vec<RoomLinenRequirement>> {
        let requirements = self.requirements.read().await;
        Ok(requirements
            .iter()
            .filter(|((room, _), _)| *room == room_id)
            .map(|((room, item), quantity)| RoomLinenRequirement {
                room_id: *room,
                catalog_item_id: *item,
                quantity: *quantity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::CorrelationId;
    use futures_util::StreamExt;

    use super::*;
    use crate::{Bucket, MovementKind, MovementOrigin, StockStoreExt, Transition};

    fn single(transition: Transition) -> Commit {
        Commit::new(vec![MovementRecord::new(
            transition,
            MovementOrigin::Manual,
            CorrelationId::new(),
            Utc::now(),
        )])
    }

    async fn stocked_store(quantity: u32) -> (InMemoryStockStore, CatalogItemId) {
        let store = InMemoryStockStore::new();
        let item = CatalogItemId::new();
        store.register_item(item).await.unwrap();
        store
            .commit(single(Transition::restock(item, quantity)))
            .await
            .unwrap();
        (store, item)
    }

    #[tokio::test]
    async fn register_item_is_idempotent() {
        let (store, item) = stocked_store(10).await;

        let again = store.register_item(item).await.unwrap();
        assert_eq!(again.total, 10);
        assert_eq!(again.available, 10);
    }

    #[tokio::test]
    async fn commit_updates_counters_and_log() {
        let (store, item) = stocked_store(10).await;

        let applied = store.commit(single(Transition::issue(item, 4))).await.unwrap();
        assert_eq!(applied.counters.len(), 1);
        assert_eq!(applied.counters[0].available, 6);
        assert_eq!(applied.counters[0].in_use, 4);
        assert_eq!(applied.records.len(), 1);

        assert_eq!(store.movement_count().await, 2);
        let counters = store.counters(item).await.unwrap().unwrap();
        assert_eq!(counters, applied.counters[0]);
    }

    #[tokio::test]
    async fn failed_commit_changes_nothing() {
        let (store, item) = stocked_store(5).await;

        let result = store.commit(single(Transition::issue(item, 6))).await;
        assert!(matches!(result, Err(StoreError::Underflow { .. })));

        let counters = store.counters(item).await.unwrap().unwrap();
        assert_eq!(counters.available, 5);
        assert_eq!(store.movement_count().await, 1);
    }

    #[tokio::test]
    async fn commit_on_unknown_item_fails() {
        let store = InMemoryStockStore::new();
        let result = store
            .commit(single(Transition::restock(CatalogItemId::new(), 1)))
            .await;
        assert!(matches!(result, Err(StoreError::UnknownItem(_))));
    }

    #[tokio::test]
    async fn unavailable_store_rejects_everything() {
        let (store, item) = stocked_store(5).await;
        store.set_unavailable(true);

        let result = store.commit(single(Transition::issue(item, 1))).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.counters(item).await.is_err());

        store.set_unavailable(false);
        let counters = store.counters(item).await.unwrap().unwrap();
        assert_eq!(counters.available, 5);
        assert_eq!(store.movement_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_issues_never_oversell() {
        let (store, item) = stocked_store(5).await;

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.commit(single(Transition::issue(item, 5))).await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.commit(single(Transition::issue(item, 5))).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(StoreError::Underflow { bucket: Bucket::Available, .. })))
        );

        let counters = store.counters(item).await.unwrap().unwrap();
        assert_eq!(counters.available, 0);
        assert_eq!(counters.in_use, 5);
        assert!(counters.is_balanced());
    }

    #[tokio::test]
    async fn query_returns_newest_first_with_filters() {
        let (store, item) = stocked_store(10).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.commit(single(Transition::issue(item, 2))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.commit(single(Transition::soil(item, 1))).await.unwrap();

        let all = store.query_movements(MovementQuery::for_item(item)).await.unwrap();
        let kinds: Vec<_> = all.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![MovementKind::Soil, MovementKind::Issue, MovementKind::Restock]
        );

        let paged = store
            .query_movements(MovementQuery::new().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].kind, MovementKind::Issue);

        let latest = store
            .latest_movement(MovementQuery::new().kind(MovementKind::Restock))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.kind, MovementKind::Restock);
    }

    #[tokio::test]
    async fn stream_restarts_from_the_beginning() {
        let (store, item) = stocked_store(3).await;
        store.commit(single(Transition::issue(item, 1))).await.unwrap();

        let first: Vec<_> = store
            .stream_movements(MovementQuery::new())
            .await
            .unwrap()
            .collect()
            .await;
        let second: Vec<_> = store
            .stream_movements(MovementQuery::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn paged_stream_walks_every_page() {
        let (store, item) = stocked_store(10).await;
        for _ in 0..4 {
            store.commit(single(Transition::issue(item, 1))).await.unwrap();
        }

        let all: Vec<_> = crate::store::paged_stream(store.clone(), MovementQuery::new(), 2)
            .collect()
            .await;
        assert_eq!(all.len(), 5);

        let limited: Vec<_> =
            crate::store::paged_stream(store, MovementQuery::new().offset(1).limit(3), 2)
                .collect()
                .await;
        assert_eq!(limited.len(), 3);
    }

    fn delivery_commit(room: RoomId, item: CatalogItemId, quantity: u32) -> Commit {
        let correlation = CorrelationId::new();
        Commit::new(vec![
            MovementRecord::new(
                Transition::issue(item, quantity),
                MovementOrigin::ExtraDelivery,
                correlation,
                Utc::now(),
            )
            .with_room(Some(room)),
        ])
        .with_deliveries(vec![ExtraDelivery::new(
            room,
            item,
            quantity,
            None,
            Utc::now(),
            None,
            correlation,
        )])
    }

    fn cleaning_commit(room: RoomId, item: CatalogItemId, quantity: u32) -> Commit {
        let correlation = CorrelationId::new();
        let record = |transition| {
            MovementRecord::new(transition, MovementOrigin::Cleaning, correlation, Utc::now())
                .with_room(Some(room))
        };
        Commit::new(vec![
            record(Transition::soil(item, quantity)),
            record(Transition::issue(item, quantity)),
        ])
    }

    #[tokio::test]
    async fn deliveries_are_recorded_with_the_commit() {
        let (store, item) = stocked_store(5).await;
        let room = RoomId::new();

        let applied = store.commit(delivery_commit(room, item, 2)).await.unwrap();
        assert_eq!(applied.deliveries.len(), 1);
        assert_eq!(
            applied.deliveries[0].delivered_at,
            applied.records[0].timestamp
        );

        let for_room = store.deliveries_for_room(room).await.unwrap();
        assert_eq!(for_room, applied.deliveries);
        assert_eq!(store.outstanding_deliveries(room).await.unwrap().len(), 1);
        assert!(store.deliveries_for_room(RoomId::new()).await.unwrap().is_empty());
        assert_eq!(store.recent_deliveries(10).await.unwrap().len(), 1);
        assert!(store.recent_deliveries(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleaning_collects_a_delivery_once() {
        let (store, item) = stocked_store(10).await;
        let room = RoomId::new();
        let delivered = store.commit(delivery_commit(room, item, 2)).await.unwrap();
        let delivery_id = delivered.deliveries[0].id;

        let first = cleaning_commit(room, item, 2).with_reconciled(vec![delivery_id]);
        let correlation = first.correlation_id();
        store.commit(first).await.unwrap();

        assert!(store.outstanding_deliveries(room).await.unwrap().is_empty());
        let kept = store.deliveries_for_room(room).await.unwrap();
        assert_eq!(kept[0].reconciled_by, correlation);

        // A second cleaning that read the same assignment writes nothing
        let before = store.counters(item).await.unwrap().unwrap();
        let second = cleaning_commit(room, item, 2).with_reconciled(vec![delivery_id]);
        let result = store.commit(second).await;
        assert!(matches!(result, Err(StoreError::StaleDelivery(id)) if id == delivery_id));
        assert_eq!(store.counters(item).await.unwrap().unwrap(), before);
        assert_eq!(store.movement_count().await, 4);
    }

    #[tokio::test]
    async fn deliveries_of_another_room_cannot_be_collected() {
        let (store, item) = stocked_store(10).await;
        let delivered = store
            .commit(delivery_commit(RoomId::new(), item, 1))
            .await
            .unwrap();

        let result = store
            .commit(
                cleaning_commit(RoomId::new(), item, 1)
                    .with_reconciled(vec![delivered.deliveries[0].id]),
            )
            .await;
        assert!(matches!(result, Err(StoreError::StaleDelivery(_))));
    }

    #[tokio::test]
    async fn commit_time_is_taken_under_the_log_lock() {
        let (store, item) = stocked_store(10).await;
        let newest = store
            .latest_movement(MovementQuery::new())
            .await
            .unwrap()
            .unwrap();

        // Built long before it reaches the store
        let stale = Commit::new(vec![MovementRecord::new(
            Transition::issue(item, 1),
            MovementOrigin::Manual,
            CorrelationId::new(),
            Utc::now() - chrono::Duration::hours(1),
        )]);
        let applied = store.commit(stale).await.unwrap();
        assert!(applied.records[0].timestamp >= newest.timestamp);

        let latest = store
            .latest_movement(MovementQuery::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, applied.records[0].id);
        assert_eq!(latest.kind, MovementKind::Issue);
    }

    #[tokio::test]
    async fn reference_store_requirements() {
        let reference = InMemoryReferenceStore::new();
        let room = Room::new("101", crate::RoomType::Double, 2);
        let towel = CatalogItem::new("Towel");
        let sheet = CatalogItem::new("Sheet");
        reference.upsert_room(room.clone()).await;
        reference.upsert_item(towel.clone()).await;
        reference.upsert_item(sheet.clone()).await;

        reference.set_requirement(room.id, towel.id, 2).await;
        reference.set_requirement(room.id, sheet.id, 1).await;
        assert_eq!(reference.room_requirements(room.id).await.unwrap().len(), 2);

        reference.set_requirement(room.id, sheet.id, 0).await;
        let requirements = reference.room_requirements(room.id).await.unwrap();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].catalog_item_id, towel.id);

        let names: Vec<_> = reference
            .catalog_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Sheet", "Towel"]);
    }
}
