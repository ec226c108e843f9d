//! Grouping of movement records into logical history events.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, CorrelationId, RoomId};
use serde::Serialize;
use stock_store::{Bucket, MovementKind, MovementOrigin, MovementRecord, ReferenceStore};

use crate::Result;

/// One transition inside a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryLine {
    pub catalog_item_id: CatalogItemId,
    pub kind: MovementKind,
    pub from: Option<Bucket>,
    pub to: Option<Bucket>,
    pub quantity: u32,
}

impl From<&MovementRecord> for HistoryLine {
    fn from(record: &MovementRecord) -> Self {
        Self {
            catalog_item_id: record.catalog_item_id,
            kind: record.kind,
            from: record.from,
            to: record.to,
            quantity: record.quantity,
        }
    }
}

/// Every record of one logical event (a cleaning, a reception, a delivery),
/// tied together by the correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub correlation_id: CorrelationId,
    pub origin: MovementOrigin,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<ActorId>,
    pub room_id: Option<RoomId>,
    pub notes: Option<String>,
    /// Lines in the order they were committed.
    pub lines: Vec<HistoryLine>,
}

impl HistoryEvent {
    fn start(record: &MovementRecord) -> Self {
        Self {
            correlation_id: record.correlation_id,
            origin: record.origin,
            timestamp: record.timestamp,
            actor_id: record.actor_id,
            room_id: record.room_id,
            notes: record.notes.clone(),
            lines: Vec::new(),
        }
    }

    /// Units moved by the event, summed over every line.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

/// Groups records by correlation key. Events come out newest first.
///
/// Records are expected newest first, the way the store returns them.
pub fn group_movements<I>(records: I) -> Vec<HistoryEvent>
where
    I: IntoIterator<Item = MovementRecord>,
{
    let mut events: Vec<HistoryEvent> = Vec::new();
    let mut index: HashMap<CorrelationId, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.correlation_id).or_insert_with(|| {
            events.push(HistoryEvent::start(&record));
            events.len() - 1
        });
        let event = &mut events[slot];
        if record.timestamp > event.timestamp {
            event.timestamp = record.timestamp;
        }
        event.lines.push(HistoryLine::from(&record));
    }

    for event in &mut events {
        event.lines.reverse();
    }
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

/// A history line with the item label resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLine {
    #[serde(flatten)]
    pub line: HistoryLine,
    pub item_name: String,
    pub item_icon: String,
}

/// A history event ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEvent {
    pub correlation_id: CorrelationId,
    pub origin: MovementOrigin,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<ActorId>,
    pub room_id: Option<RoomId>,
    pub room_name: Option<String>,
    pub title: String,
    pub notes: Option<String>,
    pub lines: Vec<ResolvedLine>,
}

fn title(origin: MovementOrigin, room_name: Option<&str>) -> String {
    match (origin, room_name) {
        (MovementOrigin::Cleaning, Some(room)) => format!("Room {room} cleaned"),
        (MovementOrigin::Cleaning, None) => "Room cleaned".to_string(),
        (MovementOrigin::ExtraDelivery, Some(room)) => format!("Extra delivery to room {room}"),
        (MovementOrigin::ExtraDelivery, None) => "Extra delivery".to_string(),
        (MovementOrigin::LaundryReception, _) => "Laundry reception".to_string(),
        (MovementOrigin::Restock, _) => "Restock".to_string(),
        (MovementOrigin::Damage, _) => "Damaged linen written off".to_string(),
        (MovementOrigin::Manual, _) => "Manual adjustment".to_string(),
    }
}

/// Resolves item and room labels through the reference store.
///
/// Unknown ids fall back to the raw id so a deleted catalog entry never
/// hides history.
pub async fn resolve_events<R>(events: Vec<HistoryEvent>, reference: &R) -> Result<Vec<ResolvedEvent>>
where
    R: ReferenceStore + ?Sized,
{
    let mut items: HashMap<CatalogItemId, (String, String)> = HashMap::new();
    let mut rooms: HashMap<RoomId, Option<String>> = HashMap::new();
    let mut resolved = Vec::with_capacity(events.len());

    for event in events {
        let room_name = match event.room_id {
            Some(room_id) => {
                if !rooms.contains_key(&room_id) {
                    let name = reference.room(room_id).await?.map(|r| r.name);
                    rooms.insert(room_id, name);
                }
                rooms.get(&room_id).cloned().flatten()
            }
            None => None,
        };

        let mut lines = Vec::with_capacity(event.lines.len());
        for line in event.lines {
            if !items.contains_key(&line.catalog_item_id) {
                let label = match reference.catalog_item(line.catalog_item_id).await? {
                    Some(item) => (item.name, item.icon),
                    None => (line.catalog_item_id.to_string(), String::new()),
                };
                items.insert(line.catalog_item_id, label);
            }
            let (item_name, item_icon) = items
                .get(&line.catalog_item_id)
                .cloned()
                .unwrap_or_default();
            lines.push(ResolvedLine {
                line,
                item_name,
                item_icon,
            });
        }

        resolved.push(ResolvedEvent {
            correlation_id: event.correlation_id,
            origin: event.origin,
            timestamp: event.timestamp,
            actor_id: event.actor_id,
            room_id: event.room_id,
            title: title(event.origin, room_name.as_deref()),
            room_name,
            notes: event.notes,
            lines,
        });
    }

    Ok(resolved)
}
