use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, CorrelationId, DeliveryId, RoomId};
use serde::{Deserialize, Serialize};

/// Reason recorded when a delivery is made without one.
pub const DEFAULT_DELIVERY_REASON: &str = "Guest request";

/// An ad-hoc issuance of linen to a room outside its base requirement.
///
/// Immutable once recorded, apart from `reconciled_by`, which the cleaning
/// that collects the units sets exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDelivery {
    pub id: DeliveryId,
    pub room_id: RoomId,
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
    pub reason: String,
    pub delivered_at: DateTime<Utc>,
    pub delivered_by: Option<ActorId>,
    pub correlation_id: CorrelationId,
    /// Correlation key of the cleaning that collected these units.
    #[serde(default)]
    pub reconciled_by: Option<CorrelationId>,
}

impl ExtraDelivery {
    pub fn new(
        room_id: RoomId,
        catalog_item_id: CatalogItemId,
        quantity: u32,
        reason: Option<String>,
        delivered_at: DateTime<Utc>,
        delivered_by: Option<ActorId>,
        correlation_id: CorrelationId,
    ) -> Self {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_DELIVERY_REASON.to_string());

        Self {
            id: DeliveryId::new(),
            room_id,
            catalog_item_id,
            quantity,
            reason,
            delivered_at,
            delivered_by,
            correlation_id,
            reconciled_by: None,
        }
    }

    /// True until a cleaning collects the units.
    pub fn is_outstanding(&self) -> bool {
        self.reconciled_by.is_none()
    }
}
