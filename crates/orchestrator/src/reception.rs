//! Laundry reception: dirty units come back available.

use common::{ActorId, CatalogItemId, CorrelationId};
use ledger::{LedgerBatch, StockLedger, merge_quantities};
use serde::Serialize;
use stock_store::{MovementOrigin, StockCounters, StockStore, Transition};

use crate::cleaning::AssignedItem;
use crate::error::{OrchestratorError, Result};

/// A non-blocking warning shown before a reception is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceptionWarning {
    /// Nothing to receive.
    ZeroQuantity,
    /// More units than are currently at the laundry.
    ExceedsDirty { requested: u32, dirty: u32 },
}

impl std::fmt::Display for ReceptionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceptionWarning::ZeroQuantity => write!(f, "Quantity must be greater than zero"),
            ReceptionWarning::ExceedsDirty { requested, dirty } => write!(
                f,
                "Receiving {requested} but only {dirty} are recorded as dirty"
            ),
        }
    }
}

/// Outcome of a multi-item reception.
#[derive(Debug, Clone, Serialize)]
pub struct ReceptionReport {
    pub correlation_id: CorrelationId,
    pub items: Vec<AssignedItem>,
    pub counters: Vec<StockCounters>,
}

/// Records clean linen returning from the laundry.
pub struct ReceptionOrchestrator<S: StockStore> {
    ledger: StockLedger<S>,
}

impl<S: StockStore> ReceptionOrchestrator<S> {
    /// Creates a new reception orchestrator.
    pub fn new(store: S) -> Self {
        Self {
            ledger: StockLedger::new(store),
        }
    }

    /// Pre-check for a reception. The ledger stays authoritative; this only
    /// tells the caller what is likely to be rejected.
    pub async fn check_reception(
        &self,
        catalog_item_id: CatalogItemId,
        quantity: u32,
    ) -> Result<Option<ReceptionWarning>> {
        if quantity == 0 {
            return Ok(Some(ReceptionWarning::ZeroQuantity));
        }
        let counters = self.ledger.counters(catalog_item_id).await?;
        if quantity > counters.dirty {
            return Ok(Some(ReceptionWarning::ExceedsDirty {
                requested: quantity,
                dirty: counters.dirty,
            }));
        }
        Ok(None)
    }

    /// Receives one item from the laundry.
    #[tracing::instrument(skip(self))]
    pub async fn receive_laundry(
        &self,
        catalog_item_id: CatalogItemId,
        quantity: u32,
    ) -> Result<StockCounters> {
        let counters = self
            .ledger
            .receive_from_laundry(catalog_item_id, quantity)
            .await?;
        metrics::counter!("laundry_receptions_total").increment(1);
        Ok(counters)
    }

    /// Receives several items as one reception event. All or nothing.
    #[tracing::instrument(skip(self, lines))]
    pub async fn receive_laundry_batch(
        &self,
        actor_id: Option<ActorId>,
        lines: Vec<(CatalogItemId, u32)>,
    ) -> Result<ReceptionReport> {
        if lines.is_empty() {
            return Err(OrchestratorError::EmptyBatch);
        }
        if let Some((item_id, quantity)) = lines.iter().find(|(_, q)| *q == 0) {
            return Err(ledger::LedgerError::InvalidQuantity {
                item_id: *item_id,
                quantity: *quantity,
            }
            .into());
        }

        let merged = merge_quantities(lines)?;
        let mut batch = LedgerBatch::new(MovementOrigin::LaundryReception).actor(actor_id);
        for (item, quantity) in &merged {
            batch = batch.push(Transition::receive_from_laundry(*item, *quantity));
        }

        let result = self.ledger.commit(batch).await?;
        metrics::counter!("laundry_receptions_total").increment(1);
        tracing::info!(
            correlation_id = %result.correlation_id,
            items = merged.len(),
            "laundry reception recorded"
        );

        Ok(ReceptionReport {
            correlation_id: result.correlation_id,
            items: merged
                .into_iter()
                .map(|(catalog_item_id, quantity)| AssignedItem {
                    catalog_item_id,
                    quantity,
                })
                .collect(),
            counters: result.counters,
        })
    }
}
