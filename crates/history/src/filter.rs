//! History filters and summary statistics.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use stock_store::{MovementOrigin, MovementQuery};

use crate::event::HistoryEvent;

/// How far back the history reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Since midnight UTC.
    #[default]
    Today,
    /// The last seven days.
    Week,
    /// The last calendar month.
    Month,
    All,
}

impl Period {
    /// Earliest timestamp included, or `None` for no lower bound.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc()),
            Period::Week => Some(now - Duration::days(7)),
            Period::Month => now.checked_sub_months(Months::new(1)),
            Period::All => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Period::Today),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "all" => Some(Period::All),
            _ => None,
        }
    }
}

/// Selects history events by origin and period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub origin: Option<MovementOrigin>,
    #[serde(default)]
    pub period: Period,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn origin(mut self, origin: MovementOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The movement query that fetches every record the filter can match.
    pub fn to_query(&self, now: DateTime<Utc>) -> MovementQuery {
        let mut query = MovementQuery::new();
        if let Some(origin) = self.origin {
            query = query.origin(origin);
        }
        if let Some(start) = self.period.start(now) {
            query = query.from_timestamp(start);
        }
        query
    }

    pub fn matches(&self, event: &HistoryEvent, now: DateTime<Utc>) -> bool {
        if let Some(origin) = self.origin
            && event.origin != origin
        {
            return false;
        }
        match self.period.start(now) {
            Some(start) => event.timestamp >= start,
            None => true,
        }
    }
}

/// Summary numbers shown above the history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub events: usize,
    pub events_today: usize,
    /// Units moved, summed over every line of every event.
    pub total_items: u64,
    pub unique_rooms: usize,
}

impl HistoryStats {
    pub fn from_events(events: &[HistoryEvent], now: DateTime<Utc>) -> Self {
        let today = Period::Today.start(now);
        let rooms: HashSet<_> = events.iter().filter_map(|e| e.room_id).collect();

        Self {
            events: events.len(),
            events_today: events
                .iter()
                .filter(|e| today.is_none_or(|start| e.timestamp >= start))
                .count(),
            total_items: events.iter().map(HistoryEvent::item_count).sum(),
            unique_rooms: rooms.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use common::{CorrelationId, RoomId};

    use super::*;
    use crate::event::HistoryLine;

    fn event(origin: MovementOrigin, timestamp: DateTime<Utc>, room: Option<RoomId>) -> HistoryEvent {
        HistoryEvent {
            correlation_id: CorrelationId::new(),
            origin,
            timestamp,
            actor_id: None,
            room_id: room,
            notes: None,
            lines: vec![HistoryLine {
                catalog_item_id: common::CatalogItemId::new(),
                kind: stock_store::MovementKind::Issue,
                from: None,
                to: None,
                quantity: 2,
            }],
        }
    }

    #[test]
    fn period_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 15, 30, 0).unwrap();
        assert_eq!(
            Period::Today.start(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(
            Period::Week.start(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 24, 15, 30, 0).unwrap())
        );
        // Clamped to the last day of February
        assert_eq!(
            Period::Month.start(now),
            Some(Utc.with_ymd_and_hms(2026, 2, 28, 15, 30, 0).unwrap())
        );
        assert_eq!(Period::All.start(now), None);
        assert_eq!(Period::parse("week"), Some(Period::Week));
        assert_eq!(Period::parse("year"), None);
    }

    #[test]
    fn filter_matches_origin_and_period() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let filter = HistoryFilter::new(Period::Week).origin(MovementOrigin::Cleaning);

        assert!(filter.matches(&event(MovementOrigin::Cleaning, yesterday, None), now));
        assert!(!filter.matches(&event(MovementOrigin::Damage, yesterday, None), now));
        assert!(!filter.matches(
            &event(MovementOrigin::Cleaning, now - Duration::days(8), None),
            now
        ));

        let query = filter.to_query(now);
        assert_eq!(query.origins, Some(vec![MovementOrigin::Cleaning]));
        assert_eq!(query.from_timestamp, Some(now - Duration::days(7)));
    }

    #[test]
    fn stats_count_items_and_rooms() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        let room = RoomId::new();
        let events = vec![
            event(MovementOrigin::Cleaning, now, Some(room)),
            event(MovementOrigin::ExtraDelivery, now, Some(room)),
            event(MovementOrigin::LaundryReception, now - Duration::days(2), None),
        ];

        let stats = HistoryStats::from_events(&events, now);
        assert_eq!(stats.events, 3);
        assert_eq!(stats.events_today, 2);
        assert_eq!(stats.total_items, 6);
        assert_eq!(stats.unique_rooms, 1);
    }
}
