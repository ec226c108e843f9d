//! Orchestration of housekeeping workflows over the stock ledger.
//!
//! Each workflow turns one staff action into a single atomic ledger batch:
//! 1. Cleaning a room: soil and reissue what the room holds
//! 2. Laundry reception: dirty units come back available
//! 3. Extra delivery: issue ad-hoc items to a room and record the request
//!
//! A workflow either commits every transition or none of them.

pub mod cleaning;
pub mod delivery;
pub mod error;
pub mod reception;
pub mod state;

pub use cleaning::{AssignedItem, CleaningOrchestrator, CleaningReport};
pub use delivery::{DEFAULT_RECENT_DELIVERIES, DeliveryReport, DeliveryTracker};
pub use error::{OrchestratorError, Result};
pub use reception::{ReceptionOrchestrator, ReceptionReport, ReceptionWarning};
pub use state::CleaningState;
