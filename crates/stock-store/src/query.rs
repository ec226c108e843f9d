use chrono::{DateTime, Utc};
use common::{CatalogItemId, CorrelationId, RoomId};

use crate::{MovementKind, MovementOrigin, MovementRecord};

/// Builder for constructing movement log queries.
///
/// Results are always ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    /// Filter by catalog item.
    pub catalog_item_id: Option<CatalogItemId>,

    /// Filter by room.
    pub room_id: Option<RoomId>,

    /// Filter by kinds (any of these).
    pub kinds: Option<Vec<MovementKind>>,

    /// Filter by origins (any of these).
    pub origins: Option<Vec<MovementOrigin>>,

    /// Filter by correlation key.
    pub correlation_id: Option<CorrelationId>,

    /// Filter by records at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by records at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,

    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl MovementQuery {
    /// Creates a new empty query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific catalog item.
    pub fn for_item(catalog_item_id: CatalogItemId) -> Self {
        Self {
            catalog_item_id: Some(catalog_item_id),
            ..Default::default()
        }
    }

    /// Creates a query for a specific room.
    pub fn for_room(room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            ..Default::default()
        }
    }

    pub fn catalog_item_id(mut self, id: CatalogItemId) -> Self {
        self.catalog_item_id = Some(id);
        self
    }

    pub fn room_id(mut self, id: RoomId) -> Self {
        self.room_id = Some(id);
        self
    }

    pub fn kind(mut self, kind: MovementKind) -> Self {
        self.kinds = Some(vec![kind]);
        self
    }

    pub fn kinds(mut self, kinds: Vec<MovementKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn origin(mut self, origin: MovementOrigin) -> Self {
        self.origins = Some(vec![origin]);
        self
    }

    pub fn origins(mut self, origins: Vec<MovementOrigin>) -> Self {
        self.origins = Some(origins);
        self
    }

    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the record passes every filter (limit and offset are
    /// not considered).
    pub fn matches(&self, record: &MovementRecord) -> bool {
        if let Some(id) = self.catalog_item_id
            && record.catalog_item_id != id
        {
            return false;
        }
        if let Some(id) = self.room_id
            && record.room_id != Some(id)
        {
            return false;
        }
        if let Some(ref kinds) = self.kinds
            && !kinds.contains(&record.kind)
        {
            return false;
        }
        if let Some(ref origins) = self.origins
            && !origins.contains(&record.origin)
        {
            return false;
        }
        if let Some(id) = self.correlation_id
            && record.correlation_id != id
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && record.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && record.timestamp > to
        {
            return false;
        }
        true
    }
}
