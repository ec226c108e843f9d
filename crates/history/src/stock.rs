//! Audit replay: rebuilds per-item balances from the movement log alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::CatalogItemId;
use serde::Serialize;
use stock_store::{Bucket, MovementRecord, StockCounters};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Signed balance of one item as replayed from its movement records.
///
/// Signed so that a log replayed out of order, or a corrupted one, shows
/// up as a negative balance instead of a panic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayedBalance {
    pub total: i64,
    pub available: i64,
    pub in_use: i64,
    pub dirty: i64,
}

impl ReplayedBalance {
    fn apply(&mut self, record: &MovementRecord) {
        self.total += record.total_delta();
        self.available += record.delta(Bucket::Available);
        self.in_use += record.delta(Bucket::InUse);
        self.dirty += record.delta(Bucket::Dirty);
    }

    /// True when the balance equals the stored counters.
    pub fn matches(&self, counters: &StockCounters) -> bool {
        self.total == i64::from(counters.total)
            && self.available == i64::from(counters.available)
            && self.in_use == i64::from(counters.in_use)
            && self.dirty == i64::from(counters.dirty)
    }
}

/// An item whose stored counters disagree with its movement log.
#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub catalog_item_id: CatalogItemId,
    pub stored: StockCounters,
    pub replayed: ReplayedBalance,
}

struct StockState {
    balances: BTreeMap<CatalogItemId, ReplayedBalance>,
    position: ProjectionPosition,
}

/// Replays the movement log into per-item balances.
#[derive(Clone)]
pub struct StockProjection {
    state: Arc<RwLock<StockState>>,
}

impl StockProjection {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StockState {
                balances: BTreeMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Balance of one item. Items with no movements replay to zero.
    pub async fn balance(&self, catalog_item_id: CatalogItemId) -> ReplayedBalance {
        self.state
            .read()
            .await
            .balances
            .get(&catalog_item_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn balances(&self) -> BTreeMap<CatalogItemId, ReplayedBalance> {
        self.state.read().await.balances.clone()
    }

    /// Compares stored counters with the replayed log.
    pub async fn discrepancies(&self, stored: &[StockCounters]) -> Vec<Discrepancy> {
        let state = self.state.read().await;
        let mut found: Vec<Discrepancy> = stored
            .iter()
            .filter_map(|counters| {
                let replayed = state
                    .balances
                    .get(&counters.catalog_item_id)
                    .copied()
                    .unwrap_or_default();
                (!replayed.matches(counters)).then(|| Discrepancy {
                    catalog_item_id: counters.catalog_item_id,
                    stored: counters.clone(),
                    replayed,
                })
            })
            .collect();

        // Movements for items the store no longer has counters for
        for (id, replayed) in &state.balances {
            if !stored.iter().any(|c| c.catalog_item_id == *id) {
                found.push(Discrepancy {
                    catalog_item_id: *id,
                    stored: StockCounters::empty(*id),
                    replayed: *replayed,
                });
            }
        }
        found
    }
}

impl Default for StockProjection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for StockProjection {
    fn name(&self) -> &'static str {
        "StockProjection"
    }

    async fn handle(&self, record: &MovementRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .balances
            .entry(record.catalog_item_id)
            .or_default()
            .apply(record);
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.balances.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
