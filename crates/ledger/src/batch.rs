use chrono::Utc;
use common::{ActorId, CatalogItemId, CorrelationId, DeliveryId, RoomId};
use stock_store::{Commit, ExtraDelivery, MovementOrigin, MovementRecord, Transition};

use crate::error::{LedgerError, Result};

/// An extra delivery to record together with a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLine {
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
    pub reason: Option<String>,
}

/// Several transitions applied as one atomic unit.
///
/// Every record produced by a batch shares one correlation key, one
/// timestamp, one actor and one optional room. The store sets the
/// timestamp when it applies the batch. Single-item ledger calls are
/// one-element batches.
#[derive(Debug, Clone)]
pub struct LedgerBatch {
    pub origin: MovementOrigin,
    pub correlation_id: CorrelationId,
    pub transitions: Vec<Transition>,
    pub actor_id: Option<ActorId>,
    pub room_id: Option<RoomId>,
    pub notes: Option<String>,
    pub deliveries: Vec<DeliveryLine>,
    /// Outstanding deliveries to the room collected by this batch.
    pub reconciles: Vec<DeliveryId>,
}

impl LedgerBatch {
    pub fn new(origin: MovementOrigin) -> Self {
        Self {
            origin,
            correlation_id: CorrelationId::new(),
            transitions: Vec::new(),
            actor_id: None,
            room_id: None,
            notes: None,
            deliveries: Vec::new(),
            reconciles: Vec::new(),
        }
    }

    /// Creates a one-element batch.
    pub fn single(origin: MovementOrigin, transition: Transition) -> Self {
        Self::new(origin).push(transition)
    }

    pub fn push(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn actor(mut self, actor_id: impl Into<Option<ActorId>>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    pub fn room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Marks outstanding deliveries to the batch's room as collected.
    pub fn reconcile(mut self, deliveries: impl IntoIterator<Item = DeliveryId>) -> Self {
        self.reconciles.extend(deliveries);
        self
    }

    /// Records an extra delivery row alongside the transitions.
    pub fn deliver(
        mut self,
        catalog_item_id: CatalogItemId,
        quantity: u32,
        reason: Option<String>,
    ) -> Self {
        self.deliveries.push(DeliveryLine {
            catalog_item_id,
            quantity,
            reason,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Checks quantities and shape before anything reaches the store.
    pub fn validate(&self) -> Result<()> {
        if self.transitions.is_empty() {
            return Err(LedgerError::InvalidBatch(
                "batch has no transitions".to_string(),
            ));
        }
        if let Some(t) = self.transitions.iter().find(|t| t.quantity == 0) {
            return Err(LedgerError::InvalidQuantity {
                item_id: t.catalog_item_id,
                quantity: t.quantity,
            });
        }
        if let Some(d) = self.deliveries.iter().find(|d| d.quantity == 0) {
            return Err(LedgerError::InvalidQuantity {
                item_id: d.catalog_item_id,
                quantity: d.quantity,
            });
        }
        if !self.deliveries.is_empty() && self.room_id.is_none() {
            return Err(LedgerError::InvalidBatch(
                "deliveries require a room".to_string(),
            ));
        }
        if !self.reconciles.is_empty() && self.room_id.is_none() {
            return Err(LedgerError::InvalidBatch(
                "collecting deliveries requires a room".to_string(),
            ));
        }
        Ok(())
    }

    /// Turns the batch into a store commit.
    pub fn into_commit(self) -> Result<Commit> {
        self.validate()?;

        let timestamp = Utc::now();
        let records = self
            .transitions
            .iter()
            .map(|t| {
                MovementRecord::new(*t, self.origin, self.correlation_id, timestamp)
                    .with_actor(self.actor_id)
                    .with_room(self.room_id)
                    .with_notes(self.notes.clone())
            })
            .collect();

        let deliveries = match self.room_id {
            Some(room_id) => self
                .deliveries
                .into_iter()
                .map(|line| {
                    ExtraDelivery::new(
                        room_id,
                        line.catalog_item_id,
                        line.quantity,
                        line.reason,
                        timestamp,
                        self.actor_id,
                        self.correlation_id,
                    )
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Commit::new(records)
            .with_deliveries(deliveries)
            .with_reconciled(self.reconciles))
    }
}

#[cfg(test)]
mod tests {
    use stock_store::{Bucket, DEFAULT_DELIVERY_REASON, MovementKind};

    use super::*;

    #[test]
    fn into_commit_stamps_shared_context() {
        let item = CatalogItemId::new();
        let room = RoomId::new();
        let actor = ActorId::new();
        let batch = LedgerBatch::new(MovementOrigin::Cleaning)
            .push(Transition::soil(item, 2))
            .push(Transition::issue(item, 2))
            .actor(actor)
            .room(room);
        let correlation = batch.correlation_id;

        let commit = batch.into_commit().unwrap();
        assert_eq!(commit.records.len(), 2);
        assert!(commit.records.iter().all(|r| {
            r.correlation_id == correlation
                && r.room_id == Some(room)
                && r.actor_id == Some(actor)
                && r.origin == MovementOrigin::Cleaning
        }));
        assert_eq!(commit.records[0].timestamp, commit.records[1].timestamp);
        assert_eq!(commit.records[0].kind, MovementKind::Soil);
        assert_eq!(commit.records[1].kind, MovementKind::Issue);
    }

    #[test]
    fn deliveries_carry_the_batch_room() {
        let item = CatalogItemId::new();
        let room = RoomId::new();
        let commit = LedgerBatch::single(MovementOrigin::ExtraDelivery, Transition::issue(item, 1))
            .room(room)
            .deliver(item, 1, None)
            .into_commit()
            .unwrap();

        assert_eq!(commit.deliveries.len(), 1);
        assert_eq!(commit.deliveries[0].room_id, room);
        assert_eq!(commit.deliveries[0].reason, DEFAULT_DELIVERY_REASON);
    }

    #[test]
    fn zero_quantity_is_invalid() {
        let item = CatalogItemId::new();
        let result = LedgerBatch::single(MovementOrigin::Manual, Transition::restock(item, 0))
            .into_commit();
        assert!(matches!(
            result,
            Err(LedgerError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn empty_batch_is_invalid() {
        let result = LedgerBatch::new(MovementOrigin::Manual).validate();
        assert!(matches!(result, Err(LedgerError::InvalidBatch(_))));
    }

    #[test]
    fn deliveries_without_room_are_invalid() {
        let item = CatalogItemId::new();
        let result = LedgerBatch::single(
            MovementOrigin::ExtraDelivery,
            Transition::write_off(item, 1, Bucket::Available),
        )
        .deliver(item, 1, None)
        .validate();
        assert!(matches!(result, Err(LedgerError::InvalidBatch(_))));
    }

    #[test]
    fn reconciled_deliveries_reach_the_commit() {
        let item = CatalogItemId::new();
        let delivery = DeliveryId::new();
        let commit = LedgerBatch::new(MovementOrigin::Cleaning)
            .push(Transition::soil(item, 1))
            .push(Transition::issue(item, 1))
            .room(RoomId::new())
            .reconcile([delivery])
            .into_commit()
            .unwrap();
        assert_eq!(commit.reconciles, vec![delivery]);
    }

    #[test]
    fn reconciling_without_room_is_invalid() {
        let item = CatalogItemId::new();
        let result = LedgerBatch::single(MovementOrigin::Cleaning, Transition::soil(item, 1))
            .reconcile([DeliveryId::new()])
            .validate();
        assert!(matches!(result, Err(LedgerError::InvalidBatch(_))));
    }
}
