//! The stock ledger: the only writer of stock counters.

use std::time::Instant;

use common::{CatalogItemId, CorrelationId};
use stock_store::{
    Bucket, ExtraDelivery, MovementOrigin, MovementQuery, MovementRecord, MovementStream, StockCounters,
    StockStore, Transition,
};

use crate::batch::LedgerBatch;
use crate::error::{LedgerError, Result};

/// Outcome of a committed batch.
#[derive(Debug, Clone)]
pub struct CommitResult {
    /// Correlation key shared by every record of the batch.
    pub correlation_id: CorrelationId,

    /// The records appended to the movement log.
    pub records: Vec<MovementRecord>,

    /// Extra delivery rows stored with the batch.
    pub deliveries: Vec<ExtraDelivery>,

    /// Updated counters of the touched items, ascending by item id.
    pub counters: Vec<StockCounters>,
}

impl CommitResult {
    /// Returns the updated counters of one item.
    pub fn counters_for(&self, catalog_item_id: CatalogItemId) -> Option<&StockCounters> {
        self.counters
            .iter()
            .find(|c| c.catalog_item_id == catalog_item_id)
    }
}

/// Per-item stock counters and their transitions.
///
/// Every change goes through [`StockLedger::commit`], which stamps a
/// [`LedgerBatch`] into movement records and hands it to the store as one
/// atomic unit.
pub struct StockLedger<S: StockStore> {
    store: S,
}

impl<S: StockStore> StockLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates zero counters for a catalog item. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn register_item(&self, catalog_item_id: CatalogItemId) -> Result<StockCounters> {
        Ok(self.store.register_item(catalog_item_id).await?)
    }

    /// Returns the counters of an item.
    pub async fn counters(&self, catalog_item_id: CatalogItemId) -> Result<StockCounters> {
        self.store
            .counters(catalog_item_id)
            .await?
            .ok_or(LedgerError::UnknownItem(catalog_item_id))
    }

    /// Returns the counters of every registered item.
    pub async fn all_counters(&self) -> Result<Vec<StockCounters>> {
        Ok(self.store.all_counters().await?)
    }

    /// Adds new units: `total += q`, `available += q`.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, catalog_item_id: CatalogItemId, quantity: u32) -> Result<StockCounters> {
        self.apply_single(
            MovementOrigin::Restock,
            Transition::restock(catalog_item_id, quantity),
        )
        .await
    }

    /// Moves units from available to in use.
    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, catalog_item_id: CatalogItemId, quantity: u32) -> Result<StockCounters> {
        self.apply_single(
            MovementOrigin::Manual,
            Transition::issue(catalog_item_id, quantity),
        )
        .await
    }

    /// Moves units from in use to dirty.
    #[tracing::instrument(skip(self))]
    pub async fn soil(&self, catalog_item_id: CatalogItemId, quantity: u32) -> Result<StockCounters> {
        self.apply_single(
            MovementOrigin::Manual,
            Transition::soil(catalog_item_id, quantity),
        )
        .await
    }

    /// Moves units from dirty back to available.
    #[tracing::instrument(skip(self))]
    pub async fn receive_from_laundry(
        &self,
        catalog_item_id: CatalogItemId,
        quantity: u32,
    ) -> Result<StockCounters> {
        self.apply_single(
            MovementOrigin::LaundryReception,
            Transition::receive_from_laundry(catalog_item_id, quantity),
        )
        .await
    }

    /// Removes units from a bucket and from the total.
    #[tracing::instrument(skip(self))]
    pub async fn write_off(
        &self,
        catalog_item_id: CatalogItemId,
        quantity: u32,
        from: Bucket,
    ) -> Result<StockCounters> {
        self.apply_single(
            MovementOrigin::Damage,
            Transition::write_off(catalog_item_id, quantity, from),
        )
        .await
    }

    async fn apply_single(
        &self,
        origin: MovementOrigin,
        transition: Transition,
    ) -> Result<StockCounters> {
        let catalog_item_id = transition.catalog_item_id;
        let result = self.commit(LedgerBatch::single(origin, transition)).await?;
        result
            .counters_for(catalog_item_id)
            .cloned()
            .ok_or(LedgerError::UnknownItem(catalog_item_id))
    }

    /// Applies a batch atomically.
    ///
    /// Either every transition is applied and recorded, or the counters and
    /// the log are left exactly as they were.
    #[tracing::instrument(
        skip(self, batch),
        fields(origin = %batch.origin, correlation_id = %batch.correlation_id)
    )]
    pub async fn commit(&self, batch: LedgerBatch) -> Result<CommitResult> {
        let start = Instant::now();
        let origin = batch.origin;
        let correlation_id = batch.correlation_id;

        let commit = match batch.into_commit() {
            Ok(commit) => commit,
            Err(e) => return Err(Self::rejected(origin, e)),
        };

        let applied = match self.store.commit(commit).await {
            Ok(applied) => applied,
            Err(e) => return Err(Self::rejected(origin, e.into())),
        };

        metrics::histogram!("ledger_commit_duration_seconds").record(start.elapsed().as_secs_f64());
        for record in &applied.records {
            metrics::counter!("ledger_transitions_total", "kind" => record.kind.as_str())
                .increment(1);
        }
        tracing::info!(
            %correlation_id,
            %origin,
            transitions = applied.records.len(),
            "ledger batch committed"
        );

        Ok(CommitResult {
            correlation_id,
            records: applied.records,
            deliveries: applied.deliveries,
            counters: applied.counters,
        })
    }

    fn rejected(origin: MovementOrigin, error: LedgerError) -> LedgerError {
        metrics::counter!("ledger_rejections_total", "reason" => error.reason()).increment(1);
        tracing::warn!(%origin, reason = error.reason(), error = %error, "ledger batch rejected");
        error
    }

    /// Retrieves movement records matching a query, newest first.
    pub async fn query_movements(&self, query: MovementQuery) -> Result<Vec<MovementRecord>> {
        Ok(self.store.query_movements(query).await?)
    }

    /// Streams movement records matching a query, newest first.
    pub async fn stream_movements(&self, query: MovementQuery) -> Result<MovementStream> {
        Ok(self.store.stream_movements(query).await?)
    }
}
