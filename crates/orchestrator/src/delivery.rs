//! Extra deliveries: ad-hoc issuance to a room.

use common::{ActorId, CatalogItemId, CorrelationId, RoomId};
use ledger::{LedgerBatch, LedgerError, StockLedger, merge_quantities};
use serde::Serialize;
use stock_store::{
    ExtraDelivery, MovementOrigin, ReferenceStore, StockCounters, StockStore, Transition,
};

use crate::error::{OrchestratorError, Result};

/// Number of deliveries returned when no limit is given.
pub const DEFAULT_RECENT_DELIVERIES: usize = 10;

/// Outcome of a delivery batch.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub room_id: RoomId,
    pub correlation_id: CorrelationId,
    pub deliveries: Vec<ExtraDelivery>,
    pub counters: Vec<StockCounters>,
}

/// Issues extra linen to rooms and keeps the delivery rows.
pub struct DeliveryTracker<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    ledger: StockLedger<S>,
    reference: R,
}

impl<S, R> DeliveryTracker<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    /// Creates a new delivery tracker.
    pub fn new(store: S, reference: R) -> Self {
        Self {
            ledger: StockLedger::new(store),
            reference,
        }
    }

    /// Issues every requested item to the room, or nothing.
    ///
    /// Duplicate items are summed. Available stock is checked for every item
    /// before the batch is committed.
    #[tracing::instrument(skip(self, lines, reason))]
    pub async fn deliver_extra(
        &self,
        room_id: RoomId,
        actor_id: ActorId,
        lines: Vec<(CatalogItemId, u32)>,
        reason: Option<String>,
    ) -> Result<DeliveryReport> {
        if lines.is_empty() {
            return Err(OrchestratorError::EmptyBatch);
        }
        if let Some((item_id, quantity)) = lines.iter().find(|(_, q)| *q == 0) {
            return Err(LedgerError::InvalidQuantity {
                item_id: *item_id,
                quantity: *quantity,
            }
            .into());
        }

        self.reference
            .room(room_id)
            .await?
            .ok_or(OrchestratorError::UnknownRoom(room_id))?;

        let merged = merge_quantities(lines)?;
        for (item, quantity) in &merged {
            let counters = self.ledger.counters(*item).await?;
            if counters.available < *quantity {
                let err = LedgerError::InsufficientStock {
                    item_id: *item,
                    requested: *quantity,
                    held: counters.available,
                };
                tracing::warn!(%room_id, error = %err, "extra delivery rejected");
                return Err(err.into());
            }
        }

        let mut batch = LedgerBatch::new(MovementOrigin::ExtraDelivery)
            .actor(actor_id)
            .room(room_id);
        if let Some(reason) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            batch = batch.notes(reason);
        }
        for (item, quantity) in &merged {
            batch = batch
                .push(Transition::issue(*item, *quantity))
                .deliver(*item, *quantity, reason.clone());
        }

        let result = self.ledger.commit(batch).await?;
        metrics::counter!("extra_deliveries_total").increment(result.deliveries.len() as u64);

        Ok(DeliveryReport {
            room_id,
            correlation_id: result.correlation_id,
            deliveries: result.deliveries,
            counters: result.counters,
        })
    }

    /// The latest deliveries across all rooms, newest first.
    pub async fn recent_deliveries(&self, limit: usize) -> Result<Vec<ExtraDelivery>> {
        Ok(self.ledger.store().recent_deliveries(limit).await?)
    }

    /// Every delivery made to a room, newest first.
    pub async fn deliveries_for_room(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>> {
        Ok(self.ledger.store().deliveries_for_room(room_id).await?)
    }
}
