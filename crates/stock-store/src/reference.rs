//! Read-only reference data: the catalog, the rooms and each room's base
//! linen requirement.

use common::{CatalogItemId, RoomId};
use serde::{Deserialize, Serialize};

/// A trackable linen item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub unit: String,
    pub icon: String,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CatalogItemId::new(),
            name: name.into(),
            unit: "unit".to_string(),
            icon: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Double,
    Single,
    Twin,
    Suite,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Double => "double",
            RoomType::Single => "single",
            RoomType::Twin => "twin",
            RoomType::Suite => "suite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "double" => Some(RoomType::Double),
            "single" => Some(RoomType::Single),
            "twin" => Some(RoomType::Twin),
            "suite" => Some(RoomType::Suite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Occupied,
    Free,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Occupied => "occupied",
            RoomStatus::Free => "free",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "occupied" => Some(RoomStatus::Occupied),
            "free" => Some(RoomStatus::Free),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub room_type: RoomType,
    pub capacity: u32,
    pub status: RoomStatus,
}

impl Room {
    pub fn new(name: impl Into<String>, room_type: RoomType, capacity: u32) -> Self {
        Self {
            id: RoomId::new(),
            name: name.into(),
            room_type,
            capacity,
            status: RoomStatus::Free,
        }
    }
}

/// Quantity of an item a room needs per cleaning cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLinenRequirement {
    pub room_id: RoomId,
    pub catalog_item_id: CatalogItemId,
    pub quantity: u32,
}
