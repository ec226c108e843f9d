use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, CorrelationId, MovementId, RoomId};
use serde::{Deserialize, Serialize};

use crate::Bucket;

/// The ledger operation a movement record was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// New units enter the system as available.
    Restock,
    /// Available units are put into a room.
    Issue,
    /// In-use units are collected dirty.
    Soil,
    /// Dirty units come back clean from the laundry.
    LaundryReceived,
    /// Units leave the system (damage, loss).
    WriteOff,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Restock => "restock",
            MovementKind::Issue => "issue",
            MovementKind::Soil => "soil",
            MovementKind::LaundryReceived => "laundry_received",
            MovementKind::WriteOff => "write_off",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "restock" => Some(MovementKind::Restock),
            "issue" => Some(MovementKind::Issue),
            "soil" => Some(MovementKind::Soil),
            "laundry_received" => Some(MovementKind::LaundryReceived),
            "write_off" => Some(MovementKind::WriteOff),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The logical event class a movement belongs to.
///
/// Used to group movements into history entries and to find the last
/// cleaning of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementOrigin {
    Cleaning,
    ExtraDelivery,
    LaundryReception,
    Restock,
    Damage,
    Manual,
}

impl MovementOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementOrigin::Cleaning => "cleaning",
            MovementOrigin::ExtraDelivery => "extra_delivery",
            MovementOrigin::LaundryReception => "laundry_reception",
            MovementOrigin::Restock => "restock",
            MovementOrigin::Damage => "damage",
            MovementOrigin::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cleaning" => Some(MovementOrigin::Cleaning),
            "extra_delivery" => Some(MovementOrigin::ExtraDelivery),
            "laundry_reception" => Some(MovementOrigin::LaundryReception),
            "restock" => Some(MovementOrigin::Restock),
            "damage" => Some(MovementOrigin::Damage),
            "manual" => Some(MovementOrigin::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single quantity move between buckets, before it is stamped into a
/// movement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub catalog_item_id: CatalogItemId,
    pub kind: MovementKind,
    pub from: Option<Bucket>,
    pub to: Option<Bucket>,
    pub quantity: u32,
}

impl Transition {
    pub fn restock(catalog_item_id: CatalogItemId, quantity: u32) -> Self {
        Self {
            catalog_item_id,
            kind: MovementKind::Restock,
            from: None,
            to: Some(Bucket::Available),
            quantity,
        }
    }

    pub fn issue(catalog_item_id: CatalogItemId, quantity: u32) -> Self {
        Self {
            catalog_item_id,
            kind: MovementKind::Issue,
            from: Some(Bucket::Available),
            to: Some(Bucket::InUse),
            quantity,
        }
    }

    pub fn soil(catalog_item_id: CatalogItemId, quantity: u32) -> Self {
        Self {
            catalog_item_id,
            kind: MovementKind::Soil,
            from: Some(Bucket::InUse),
            to: Some(Bucket::Dirty),
            quantity,
        }
    }

    pub fn receive_from_laundry(catalog_item_id: CatalogItemId, quantity: u32) -> Self {
        Self {
            catalog_item_id,
            kind: MovementKind::LaundryReceived,
            from: Some(Bucket::Dirty),
            to: Some(Bucket::Available),
            quantity,
        }
    }

    pub fn write_off(catalog_item_id: CatalogItemId, quantity: u32, from: Bucket) -> Self {
        Self {
            catalog_item_id,
            kind: MovementKind::WriteOff,
            from: Some(from),
            to: None,
            quantity,
        }
    }
}

/// An immutable entry of the movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub catalog_item_id: CatalogItemId,
    pub kind: MovementKind,
    pub from: Option<Bucket>,
    pub to: Option<Bucket>,
    pub quantity: u32,
    pub origin: MovementOrigin,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<ActorId>,
    pub room_id: Option<RoomId>,
    pub correlation_id: CorrelationId,
    pub notes: Option<String>,
}

impl MovementRecord {
    /// Stamps a transition into a new record.
    pub fn new(
        transition: Transition,
        origin: MovementOrigin,
        correlation_id: CorrelationId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            catalog_item_id: transition.catalog_item_id,
            kind: transition.kind,
            from: transition.from,
            to: transition.to,
            quantity: transition.quantity,
            origin,
            timestamp,
            actor_id: None,
            room_id: None,
            correlation_id,
            notes: None,
        }
    }

    pub fn with_actor(mut self, actor_id: Option<ActorId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_room(mut self, room_id: Option<RoomId>) -> Self {
        self.room_id = room_id;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Returns the transition this record applied.
    pub fn transition(&self) -> Transition {
        Transition {
            catalog_item_id: self.catalog_item_id,
            kind: self.kind,
            from: self.from,
            to: self.to,
            quantity: self.quantity,
        }
    }

    /// Signed change this record made to a bucket.
    pub fn delta(&self, bucket: Bucket) -> i64 {
        let quantity = i64::from(self.quantity);
        let mut delta = 0;
        if self.from == Some(bucket) {
            delta -= quantity;
        }
        if self.to == Some(bucket) {
            delta += quantity;
        }
        delta
    }

    /// Signed change this record made to the item total.
    pub fn total_delta(&self) -> i64 {
        let quantity = i64::from(self.quantity);
        match (self.from, self.to) {
            (None, Some(_)) => quantity,
            (Some(_), None) => -quantity,
            _ => 0,
        }
    }
}
