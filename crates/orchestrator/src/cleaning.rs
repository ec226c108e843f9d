//! Room cleaning: soil what the room holds and reissue the same quantities,
//! as one atomic ledger batch.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, CorrelationId, DeliveryId, RoomId};
use ledger::{LedgerBatch, LedgerError, StockLedger, room_assignment};
use serde::Serialize;
use stock_store::{
    MovementOrigin, MovementQuery, ReferenceStore, StockCounters, StockStore, StockStoreExt,
    Transition,
};

use crate::error::{OrchestratorError, Result};
use crate::state::CleaningState;

/// Attempts made when another cleaning collects the room's extras first.
const CLEANING_ATTEMPTS: usize = 3;

/// One item swapped during a cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignedItem {
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
}

/// Outcome of a committed cleaning.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub room_id: RoomId,
    pub correlation_id: CorrelationId,
    pub state: CleaningState,
    pub items: Vec<AssignedItem>,
    pub counters: Vec<StockCounters>,
    pub cleaned_at: DateTime<Utc>,
}

/// Tracks the state of one cleaning and rejects out-of-order moves.
#[derive(Debug, Default)]
struct CleaningRun {
    state: CleaningState,
}

impl CleaningRun {
    fn validating(&mut self) -> Result<()> {
        self.advance(self.state.can_validate(), "Requested", CleaningState::Validating)
    }

    fn applying(&mut self) -> Result<()> {
        self.advance(self.state.can_apply(), "Validating", CleaningState::Applying)
    }

    fn committed(&mut self) -> Result<()> {
        self.advance(
            self.state.can_commit(),
            "Validating or Applying",
            CleaningState::Committed,
        )
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = CleaningState::Failed;
        }
    }

    fn advance(&mut self, allowed: bool, expected: &'static str, next: CleaningState) -> Result<()> {
        if !allowed {
            return Err(OrchestratorError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Turns "room marked clean" into ledger transitions.
pub struct CleaningOrchestrator<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    ledger: StockLedger<S>,
    reference: R,
}

impl<S, R> CleaningOrchestrator<S, R>
where
    S: StockStore,
    R: ReferenceStore,
{
    /// Creates a new cleaning orchestrator.
    pub fn new(store: S, reference: R) -> Self {
        Self {
            ledger: StockLedger::new(store),
            reference,
        }
    }

    /// Returns the ledger used for commits.
    pub fn ledger(&self) -> &StockLedger<S> {
        &self.ledger
    }

    /// When the room was last cleaned, from the movement log.
    pub async fn last_cleaned_at(&self, room_id: RoomId) -> Result<Option<DateTime<Utc>>> {
        let latest = self
            .ledger
            .store()
            .latest_movement(MovementQuery::for_room(room_id).origin(MovementOrigin::Cleaning))
            .await?;
        Ok(latest.map(|record| record.timestamp))
    }

    /// What a cleaning of the room would swap right now: the base
    /// requirement plus extras no cleaning has collected yet.
    pub async fn room_assignment(&self, room_id: RoomId) -> Result<BTreeMap<CatalogItemId, u32>> {
        Ok(self.assignment_with_extras(room_id).await?.0)
    }

    async fn assignment_with_extras(
        &self,
        room_id: RoomId,
    ) -> Result<(BTreeMap<CatalogItemId, u32>, Vec<DeliveryId>)> {
        let requirements = self.reference.room_requirements(room_id).await?;
        let outstanding = self
            .ledger
            .store()
            .outstanding_deliveries(room_id)
            .await?;
        let assignment = room_assignment(&requirements, &outstanding)?;
        Ok((assignment, outstanding.into_iter().map(|d| d.id).collect()))
    }

    /// Marks a room clean.
    ///
    /// For each assigned item in ascending id order the batch soils then
    /// reissues the quantity. Every item is checked before anything is
    /// applied, and the commit itself re-validates under lock. The extras
    /// the assignment included are marked collected by the same commit; if
    /// another cleaning collected them first the assignment is recomputed.
    #[tracing::instrument(skip(self))]
    pub async fn clean_room(&self, room_id: RoomId, actor_id: ActorId) -> Result<CleaningReport> {
        metrics::counter!("cleanings_total").increment(1);
        let start = Instant::now();
        let mut attempt = 1;

        loop {
            let mut run = CleaningRun::default();
            match self.run_cleaning(&mut run, room_id, actor_id).await {
                Ok(report) => {
                    tracing::info!(
                        %room_id,
                        correlation_id = %report.correlation_id,
                        items = report.items.len(),
                        attempt,
                        duration = start.elapsed().as_secs_f64(),
                        "room cleaned"
                    );
                    return Ok(report);
                }
                Err(OrchestratorError::Ledger(LedgerError::AssignmentChanged(delivery_id)))
                    if attempt < CLEANING_ATTEMPTS =>
                {
                    tracing::debug!(%room_id, %delivery_id, attempt, "room assignment changed, recomputing");
                    attempt += 1;
                }
                Err(e) => {
                    let failed_in = run.state;
                    run.fail();
                    metrics::counter!("cleaning_failures_total").increment(1);
                    tracing::warn!(
                        %room_id,
                        state = %failed_in,
                        error = %e,
                        "room cleaning failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn run_cleaning(
        &self,
        run: &mut CleaningRun,
        room_id: RoomId,
        actor_id: ActorId,
    ) -> Result<CleaningReport> {
        run.validating()?;

        self.reference
            .room(room_id)
            .await?
            .ok_or(OrchestratorError::UnknownRoom(room_id))?;

        let (assignment, collected) = self.assignment_with_extras(room_id).await?;
        let items: Vec<AssignedItem> = assignment
            .iter()
            .map(|(catalog_item_id, quantity)| AssignedItem {
                catalog_item_id: *catalog_item_id,
                quantity: *quantity,
            })
            .collect();

        if items.is_empty() {
            run.committed()?;
            return Ok(CleaningReport {
                room_id,
                correlation_id: CorrelationId::new(),
                state: run.state,
                items,
                counters: Vec::new(),
                cleaned_at: Utc::now(),
            });
        }

        for item in &items {
            let counters = self.ledger.counters(item.catalog_item_id).await?;
            check_swap(&counters, item.quantity)?;
        }

        run.applying()?;

        let mut batch = LedgerBatch::new(MovementOrigin::Cleaning)
            .actor(actor_id)
            .room(room_id)
            .reconcile(collected);
        for item in &items {
            batch = batch
                .push(Transition::soil(item.catalog_item_id, item.quantity))
                .push(Transition::issue(item.catalog_item_id, item.quantity));
        }

        let result = self.ledger.commit(batch).await?;
        run.committed()?;

        let cleaned_at = result
            .records
            .first()
            .map(|r| r.timestamp)
            .unwrap_or_else(Utc::now);

        Ok(CleaningReport {
            room_id,
            correlation_id: result.correlation_id,
            state: run.state,
            items,
            counters: result.counters,
            cleaned_at,
        })
    }
}

fn check_swap(counters: &StockCounters, quantity: u32) -> std::result::Result<(), LedgerError> {
    if counters.in_use < quantity {
        return Err(LedgerError::InsufficientInUse {
            item_id: counters.catalog_item_id,
            requested: quantity,
            held: counters.in_use,
        });
    }
    if counters.available < quantity {
        return Err(LedgerError::InsufficientStock {
            item_id: counters.catalog_item_id,
            requested: quantity,
            held: counters.available,
        });
    }
    Ok(())
}
