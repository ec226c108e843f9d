//! Shared application state.

use history::HistoryReader;
use ledger::StockLedger;
use orchestrator::{CleaningOrchestrator, DeliveryTracker, ReceptionOrchestrator};
use stock_store::{ReferenceStore, StockStore};

/// Everything the handlers need, built once over one store and one
/// reference source.
pub struct AppState<S, R>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    pub ledger: StockLedger<S>,
    pub cleaning: CleaningOrchestrator<S, R>,
    pub reception: ReceptionOrchestrator<S>,
    pub deliveries: DeliveryTracker<S, R>,
    pub history: HistoryReader<S, R>,
    pub reference: R,
}

impl<S, R> AppState<S, R>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    pub fn new(store: S, reference: R) -> Self {
        Self {
            ledger: StockLedger::new(store.clone()),
            cleaning: CleaningOrchestrator::new(store.clone(), reference.clone()),
            reception: ReceptionOrchestrator::new(store.clone()),
            deliveries: DeliveryTracker::new(store.clone(), reference.clone()),
            history: HistoryReader::new(store, reference.clone()),
            reference,
        }
    }

    /// Registers counters for every catalog item. Existing counters are
    /// left as they are.
    #[tracing::instrument(skip(self))]
    pub async fn sync_catalog(&self) -> ledger::Result<usize> {
        let items = self.reference.catalog_items().await?;
        for item in &items {
            self.ledger.register_item(item.id).await?;
        }
        tracing::info!(items = items.len(), "catalog counters registered");
        Ok(items.len())
    }
}
