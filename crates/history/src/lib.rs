//! Read side of the linen stock ledger.
//!
//! This crate provides:
//! - [`HistoryEvent`] grouping of movement records by correlation key, with
//!   an optional resolved view carrying item and room labels
//! - [`HistoryFilter`] and [`HistoryStats`] for the history screen
//! - [`StockProjection`], which rebuilds counters from the movement log
//!   alone, and [`audit_stock`] to compare it with the stored counters
//! - [`Projection`] trait and [`ProjectionProcessor`] for replaying the log

pub mod error;
pub mod event;
pub mod filter;
pub mod processor;
pub mod projection;
pub mod reader;
pub mod stock;

pub use error::{HistoryError, Result};
pub use event::{
    HistoryEvent, HistoryLine, ResolvedEvent, ResolvedLine, group_movements, resolve_events,
};
pub use filter::{HistoryFilter, HistoryStats, Period};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use reader::{CLEANED_BADGE_HOURS, HistoryReader, audit_stock, recently_cleaned};
pub use stock::{Discrepancy, ReplayedBalance, StockProjection};
