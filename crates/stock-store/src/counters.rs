use chrono::{DateTime, Utc};
use common::CatalogItemId;
use serde::{Deserialize, Serialize};

use crate::{MovementRecord, Result, StoreError};

/// One of the three physical states a unit of linen can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Available,
    InUse,
    Dirty,
}

impl Bucket {
    /// Returns the persisted name of the bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Available => "available",
            Bucket::InUse => "in_use",
            Bucket::Dirty => "dirty",
        }
    }

    /// Parses a persisted bucket name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Bucket::Available),
            "in_use" => Some(Bucket::InUse),
            "dirty" => Some(Bucket::Dirty),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stock counters of a single catalog item.
///
/// `total` always equals `available + in_use + dirty` once a transition has
/// been applied. Counters are unsigned and every decrement is checked, so a
/// bucket can never be observed below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounters {
    pub catalog_item_id: CatalogItemId,
    pub total: u32,
    pub available: u32,
    pub in_use: u32,
    pub dirty: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockCounters {
    /// Creates all-zero counters for a freshly registered item.
    pub fn empty(catalog_item_id: CatalogItemId) -> Self {
        Self {
            catalog_item_id,
            total: 0,
            available: 0,
            in_use: 0,
            dirty: 0,
            updated_at: None,
        }
    }

    /// Returns the quantity held in a bucket.
    pub fn get(&self, bucket: Bucket) -> u32 {
        match bucket {
            Bucket::Available => self.available,
            Bucket::InUse => self.in_use,
            Bucket::Dirty => self.dirty,
        }
    }

    fn slot(&mut self, bucket: Bucket) -> &mut u32 {
        match bucket {
            Bucket::Available => &mut self.available,
            Bucket::InUse => &mut self.in_use,
            Bucket::Dirty => &mut self.dirty,
        }
    }

    /// Returns true if the total matches the sum of the buckets.
    pub fn is_balanced(&self) -> bool {
        u64::from(self.available) + u64::from(self.in_use) + u64::from(self.dirty)
            == u64::from(self.total)
    }

    /// Applies a movement to a copy of these counters.
    ///
    /// The receiver is left untouched; on error nothing has been applied.
    pub fn apply(&self, record: &MovementRecord) -> Result<StockCounters> {
        let mut next = self.clone();
        let quantity = record.quantity;
        let item_id = self.catalog_item_id;

        match record.from {
            Some(bucket) => {
                let held = next.get(bucket);
                *next.slot(bucket) = held.checked_sub(quantity).ok_or(StoreError::Underflow {
                    item_id,
                    bucket,
                    requested: quantity,
                    held,
                })?;
            }
            None => {
                next.total = next
                    .total
                    .checked_add(quantity)
                    .ok_or(StoreError::Overflow(item_id))?;
            }
        }

        match record.to {
            Some(bucket) => {
                let slot = next.slot(bucket);
                *slot = slot
                    .checked_add(quantity)
                    .ok_or(StoreError::Overflow(item_id))?;
            }
            None => {
                // The source bucket already held the quantity, so total does too.
                next.total = next.total.checked_sub(quantity).ok_or(StoreError::Underflow {
                    item_id,
                    bucket: record.from.unwrap_or(Bucket::Available),
                    requested: quantity,
                    held: next.total,
                })?;
            }
        }

        next.updated_at = Some(record.timestamp);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use common::CorrelationId;

    use super::*;
    use crate::{MovementOrigin, Transition};

    fn record(transition: Transition) -> MovementRecord {
        MovementRecord::new(
            transition,
            MovementOrigin::Manual,
            CorrelationId::new(),
            Utc::now(),
        )
    }

    fn towels() -> StockCounters {
        StockCounters {
            total: 10,
            available: 10,
            ..StockCounters::empty(CatalogItemId::new())
        }
    }

    #[test]
    fn bucket_names_round_trip() {
        for bucket in [Bucket::Available, Bucket::InUse, Bucket::Dirty] {
            assert_eq!(Bucket::parse(bucket.as_str()), Some(bucket));
        }
        assert_eq!(Bucket::parse("clean"), None);
    }

    #[test]
    fn empty_counters_are_balanced() {
        let counters = StockCounters::empty(CatalogItemId::new());
        assert!(counters.is_balanced());
        assert_eq!(counters.total, 0);
    }

    #[test]
    fn full_cycle_returns_to_start() {
        let start = towels();
        let id = start.catalog_item_id;

        let issued = start.apply(&record(Transition::issue(id, 4))).unwrap();
        assert_eq!((issued.total, issued.available, issued.in_use, issued.dirty), (10, 6, 4, 0));

        let soiled = issued.apply(&record(Transition::soil(id, 4))).unwrap();
        assert_eq!((soiled.total, soiled.available, soiled.in_use, soiled.dirty), (10, 6, 0, 4));

        let received = soiled
            .apply(&record(Transition::receive_from_laundry(id, 4)))
            .unwrap();
        assert_eq!(
            (received.total, received.available, received.in_use, received.dirty),
            (10, 10, 0, 0)
        );
        assert!(received.is_balanced());
    }

    #[test]
    fn restock_and_write_off_change_total() {
        let start = towels();
        let id = start.catalog_item_id;

        let restocked = start.apply(&record(Transition::restock(id, 5))).unwrap();
        assert_eq!(restocked.total, 15);
        assert_eq!(restocked.available, 15);

        let written_off = restocked
            .apply(&record(Transition::write_off(id, 3, Bucket::Available)))
            .unwrap();
        assert_eq!(written_off.total, 12);
        assert_eq!(written_off.available, 12);
        assert!(written_off.is_balanced());
    }

    #[test]
    fn underflow_leaves_original_untouched() {
        let start = towels();
        let id = start.catalog_item_id;

        let err = start.apply(&record(Transition::issue(id, 11))).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Underflow {
                bucket: Bucket::Available,
                requested: 11,
                held: 10,
                ..
            }
        ));
        assert_eq!(start, towels_with_id(id));
    }

    #[test]
    fn soil_requires_in_use_stock() {
        let start = towels();
        let err = start
            .apply(&record(Transition::soil(start.catalog_item_id, 1)))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Underflow {
                bucket: Bucket::InUse,
                ..
            }
        ));
    }

    #[test]
    fn restock_overflow_is_rejected() {
        let start = StockCounters {
            total: u32::MAX,
            available: u32::MAX,
            ..StockCounters::empty(CatalogItemId::new())
        };
        let err = start
            .apply(&record(Transition::restock(start.catalog_item_id, 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
    }

    fn towels_with_id(id: CatalogItemId) -> StockCounters {
        StockCounters {
            catalog_item_id: id,
            ..towels()
        }
    }
}
