//! Replay and history over workflows driven through the orchestrators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{ActorId, CatalogItemId, RoomId};
use history::{
    HistoryFilter, HistoryReader, Period, ProjectionProcessor, StockProjection, audit_stock,
    recently_cleaned,
};
use ledger::StockLedger;
use orchestrator::{CleaningOrchestrator, DeliveryTracker, ReceptionOrchestrator};
use stock_store::{
    AppliedCommit, Bucket, CatalogItem, Commit, ExtraDelivery, InMemoryReferenceStore,
    InMemoryStockStore, MovementOrigin, MovementQuery, MovementRecord, MovementStream, Room,
    RoomType, StockCounters, StockStore,
};
use tokio::sync::Mutex;

struct Hotel {
    store: InMemoryStockStore,
    reference: InMemoryReferenceStore,
    towel: CatalogItemId,
    sheet: CatalogItemId,
    room: RoomId,
    actor: ActorId,
}

/// Two items, one room, and a day of housekeeping.
async fn busy_day() -> Hotel {
    let store = InMemoryStockStore::new();
    let reference = InMemoryReferenceStore::new();
    let ledger = StockLedger::new(store.clone());
    let actor = ActorId::new();

    let towel = CatalogItem::new("Bath towel");
    let sheet = CatalogItem::new("Sheet");
    let room = Room::new("101", RoomType::Twin, 2);
    reference.upsert_item(towel.clone()).await;
    reference.upsert_item(sheet.clone()).await;
    reference.upsert_room(room.clone()).await;
    reference.set_requirement(room.id, towel.id, 2).await;
    reference.set_requirement(room.id, sheet.id, 2).await;

    for item in [towel.id, sheet.id] {
        ledger.register_item(item).await.unwrap();
        ledger.restock(item, 12).await.unwrap();
        ledger.issue(item, 2).await.unwrap();
    }

    let cleaning = CleaningOrchestrator::new(store.clone(), reference.clone());
    let reception = ReceptionOrchestrator::new(store.clone());
    let deliveries = DeliveryTracker::new(store.clone(), reference.clone());

    cleaning.clean_room(room.id, actor).await.unwrap();
    deliveries
        .deliver_extra(room.id, actor, vec![(towel.id, 1)], Some("Late checkout".into()))
        .await
        .unwrap();
    cleaning.clean_room(room.id, actor).await.unwrap();
    reception
        .receive_laundry_batch(Some(actor), vec![(towel.id, 4), (sheet.id, 2)])
        .await
        .unwrap();
    ledger.write_off(sheet.id, 1, Bucket::Dirty).await.unwrap();
    // Rejected: nothing in the log
    assert!(ledger.issue(towel.id, 100).await.is_err());

    Hotel {
        store,
        reference,
        towel: towel.id,
        sheet: sheet.id,
        room: room.id,
        actor,
    }
}

#[tokio::test]
async fn replay_reproduces_counters() {
    let hotel = busy_day().await;

    let projection = StockProjection::new();
    let mut processor = ProjectionProcessor::new(hotel.store.clone());
    processor.register(Box::new(projection.clone()));
    processor.run_catch_up().await.unwrap();

    for item in [hotel.towel, hotel.sheet] {
        let counters = hotel.store.counters(item).await.unwrap().unwrap();
        assert!(projection.balance(item).await.matches(&counters));
    }
    assert!(audit_stock(hotel.store.clone()).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_groups_workflows() {
    let hotel = busy_day().await;
    let reader = HistoryReader::new(hotel.store.clone(), hotel.reference.clone());
    let now = Utc::now();

    let cleanings = reader
        .events(
            &HistoryFilter::new(Period::Today).origin(MovementOrigin::Cleaning),
            now,
        )
        .await
        .unwrap();
    assert_eq!(cleanings.len(), 2);
    // The newest cleaning collected the extra towel
    assert_eq!(cleanings[0].item_count(), 10);
    assert_eq!(cleanings[1].item_count(), 8);
    assert!(cleanings.iter().all(|e| e.actor_id == Some(hotel.actor)));

    let resolved = reader
        .resolved_events(&HistoryFilter::new(Period::All).limit(3), now)
        .await
        .unwrap();
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0].origin, MovementOrigin::Damage);
    assert_eq!(resolved[1].title, "Laundry reception");

    let stats = reader
        .stats(&HistoryFilter::new(Period::Today), now)
        .await
        .unwrap();
    assert_eq!(stats.unique_rooms, 1);
    assert_eq!(stats.events, stats.events_today);
}

#[tokio::test]
async fn cleaned_badge_expires() {
    let hotel = busy_day().await;
    let reader = HistoryReader::new(hotel.store.clone(), hotel.reference.clone());
    let now = Utc::now();

    assert!(reader.recently_cleaned(hotel.room, now).await.unwrap());
    assert!(
        !reader
            .recently_cleaned(hotel.room, now + Duration::hours(13))
            .await
            .unwrap()
    );
    assert!(
        !recently_cleaned(&hotel.store, RoomId::new(), now, Duration::hours(12))
            .await
            .unwrap()
    );
}

/// Restocks an item once, right after the audit has read the log.
#[derive(Clone)]
struct RestockDuringReplay {
    inner: InMemoryStockStore,
    ledger: Arc<StockLedger<InMemoryStockStore>>,
    pending: Arc<Mutex<Option<CatalogItemId>>>,
}

#[async_trait]
impl StockStore for RestockDuringReplay {
    async fn register_item(&self, id: CatalogItemId) -> stock_store::Result<StockCounters> {
        self.inner.register_item(id).await
    }

    async fn counters(&self, id: CatalogItemId) -> stock_store::Result<Option<StockCounters>> {
        self.inner.counters(id).await
    }

    async fn all_counters(&self) -> stock_store::Result<Vec<StockCounters>> {
        self.inner.all_counters().await
    }

    async fn commit(&self, commit: Commit) -> stock_store::Result<AppliedCommit> {
        self.inner.commit(commit).await
    }

    async fn query_movements(
        &self,
        query: MovementQuery,
    ) -> stock_store::Result<Vec<MovementRecord>> {
        self.inner.query_movements(query).await
    }

    async fn stream_movements(&self, query: MovementQuery) -> stock_store::Result<MovementStream> {
        let stream = self.inner.stream_movements(query).await?;
        let pending = self.pending.lock().await.take();
        if let Some(item) = pending {
            self.ledger.restock(item, 5).await.unwrap();
        }
        Ok(stream)
    }

    async fn deliveries_for_room(&self, room: RoomId) -> stock_store::Result<Vec<ExtraDelivery>> {
        self.inner.deliveries_for_room(room).await
    }

    async fn outstanding_deliveries(
        &self,
        room: RoomId,
    ) -> stock_store::Result<Vec<ExtraDelivery>> {
        self.inner.outstanding_deliveries(room).await
    }

    async fn recent_deliveries(&self, limit: usize) -> stock_store::Result<Vec<ExtraDelivery>> {
        self.inner.recent_deliveries(limit).await
    }
}

#[tokio::test]
async fn audit_ignores_commits_landing_mid_replay() {
    let hotel = busy_day().await;
    let before = hotel.store.counters(hotel.towel).await.unwrap().unwrap();
    let store = RestockDuringReplay {
        inner: hotel.store.clone(),
        ledger: Arc::new(StockLedger::new(hotel.store.clone())),
        pending: Arc::new(Mutex::new(Some(hotel.towel))),
    };

    assert!(audit_stock(store.clone()).await.unwrap().is_empty());
    // The restock did land
    let towels = hotel.store.counters(hotel.towel).await.unwrap().unwrap();
    assert_eq!(towels.total, before.total + 5);
    assert!(store.pending.lock().await.is_none());
}
