//! Stock ledger for linen inventory.
//!
//! This crate provides:
//! - [`StockLedger`], the per-item transition API (restock, issue, soil,
//!   receive from laundry, write off)
//! - [`LedgerBatch`], the multi-item atomic unit used by orchestrators
//! - room assignment derivation from requirements and extra deliveries

pub mod assignment;
pub mod batch;
pub mod error;
pub mod ledger;

pub use assignment::{merge_quantities, room_assignment};
pub use batch::{DeliveryLine, LedgerBatch};
pub use error::{LedgerError, Result};
pub use ledger::{CommitResult, StockLedger};
