//! Projection processor for feeding the movement log to projections.

use futures_util::TryStreamExt;
use stock_store::{MovementQuery, MovementRecord, StockStore};

use crate::Result;
use crate::projection::Projection;

/// Replays movement records from a stock store into projections.
///
/// The store returns records newest first; the processor replays them
/// oldest first so projections see the log in the order it was written.
pub struct ProjectionProcessor<S: StockStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: StockStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given stock store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every record a projection has not seen yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut records: Vec<MovementRecord> = self
            .store
            .stream_movements(MovementQuery::new())
            .await?
            .try_collect()
            .await?;
        records.reverse();

        for (index, record) in records.iter().enumerate() {
            let record_index = index as u64 + 1;
            for projection in &self.projections {
                if projection.position().await.records_processed < record_index {
                    projection.handle(record).await?;
                    metrics::counter!("projections_records_processed").increment(1);
                }
            }
        }

        tracing::info!(records = records.len(), "catch-up complete");
        Ok(())
    }

    /// Delivers a single record to all registered projections.
    #[tracing::instrument(skip(self, record), fields(kind = %record.kind))]
    pub async fn process_record(&self, record: &MovementRecord) -> Result<()> {
        for projection in &self.projections {
            projection.handle(record).await?;
        }
        Ok(())
    }

    /// Resets all projections and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
