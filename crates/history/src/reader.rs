//! Read-side entry points over the movement log.

use chrono::{DateTime, Duration, Utc};
use common::RoomId;
use futures_util::TryStreamExt;
use stock_store::{
    MovementOrigin, MovementQuery, MovementRecord, ReferenceStore, StockStore, StockStoreExt,
};

use crate::{HistoryError, Result};
use crate::event::{HistoryEvent, ResolvedEvent, group_movements, resolve_events};
use crate::filter::{HistoryFilter, HistoryStats};
use crate::processor::ProjectionProcessor;
use crate::stock::{Discrepancy, StockProjection};

/// Snapshots taken before the audit gives up on a busy store.
const AUDIT_ATTEMPTS: usize = 3;

/// How long a room shows as freshly cleaned.
pub const CLEANED_BADGE_HOURS: i64 = 12;

/// True if the room was cleaned within `window` before `now`.
pub async fn recently_cleaned<S>(
    store: &S,
    room_id: RoomId,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<bool>
where
    S: StockStore + ?Sized,
{
    let latest = store
        .latest_movement(MovementQuery::for_room(room_id).origin(MovementOrigin::Cleaning))
        .await?;
    Ok(latest.is_some_and(|record| record.timestamp <= now && now - record.timestamp < window))
}

/// Replays the whole log and reports items whose counters disagree with it.
///
/// Counters are read before and after the replay. Every commit changes the
/// counters it touches, so when both reads agree the replayed log and the
/// counters describe the same state; otherwise the audit starts over.
#[tracing::instrument(skip(store))]
pub async fn audit_stock<S>(store: S) -> Result<Vec<Discrepancy>>
where
    S: StockStore + Clone,
{
    for attempt in 1..=AUDIT_ATTEMPTS {
        let before = store.all_counters().await?;

        let projection = StockProjection::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(projection.clone()));
        processor.run_catch_up().await?;

        let after = store.all_counters().await?;
        if before != after {
            tracing::debug!(attempt, "stock changed during the audit, replaying again");
            continue;
        }

        let found = projection.discrepancies(&after).await;
        if !found.is_empty() {
            tracing::warn!(items = found.len(), "stock counters disagree with the movement log");
        }
        return Ok(found);
    }

    Err(HistoryError::Unsettled {
        attempts: AUDIT_ATTEMPTS,
    })
}

/// Reads grouped movement history.
pub struct HistoryReader<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    store: S,
    reference: R,
}

impl<S, R> HistoryReader<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    pub fn new(store: S, reference: R) -> Self {
        Self { store, reference }
    }

    /// Events matching the filter, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn events(&self, filter: &HistoryFilter, now: DateTime<Utc>) -> Result<Vec<HistoryEvent>> {
        let records: Vec<MovementRecord> = self
            .store
            .stream_movements(filter.to_query(now))
            .await?
            .try_collect()
            .await?;

        let mut events: Vec<HistoryEvent> = group_movements(records)
            .into_iter()
            .filter(|event| filter.matches(event, now))
            .collect();
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    /// Events with item and room labels resolved.
    pub async fn resolved_events(
        &self,
        filter: &HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ResolvedEvent>> {
        let events = self.events(filter, now).await?;
        resolve_events(events, &self.reference).await
    }

    pub async fn stats(&self, filter: &HistoryFilter, now: DateTime<Utc>) -> Result<HistoryStats> {
        let events = self.events(filter, now).await?;
        Ok(HistoryStats::from_events(&events, now))
    }

    /// True if the room was cleaned within the badge window.
    pub async fn recently_cleaned(&self, room_id: RoomId, now: DateTime<Utc>) -> Result<bool> {
        recently_cleaned(
            &self.store,
            room_id,
            now,
            Duration::hours(CLEANED_BADGE_HOURS),
        )
        .await
    }
}
