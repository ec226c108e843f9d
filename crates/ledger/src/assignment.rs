//! Room assignment: what a room currently holds and must be swapped on
//! cleaning.

use std::collections::BTreeMap;

use common::CatalogItemId;
use stock_store::{ExtraDelivery, RoomLinenRequirement};

use crate::error::{LedgerError, Result};

/// Sums quantities per item, dropping zero totals. Keys come out in
/// ascending id order.
///
/// A sum that does not fit a counter fails with `CounterOverflow`.
pub fn merge_quantities(
    lines: impl IntoIterator<Item = (CatalogItemId, u32)>,
) -> Result<BTreeMap<CatalogItemId, u32>> {
    let mut merged = BTreeMap::new();
    for (item, quantity) in lines {
        let entry = merged.entry(item).or_insert(0u32);
        *entry = entry
            .checked_add(quantity)
            .ok_or(LedgerError::CounterOverflow(item))?;
    }
    merged.retain(|_, q| *q > 0);
    Ok(merged)
}

/// Base requirement plus outstanding extra deliveries, per item.
///
/// `outstanding` must already be restricted to deliveries that have not been
/// reconciled by a cleaning.
pub fn room_assignment(
    requirements: &[RoomLinenRequirement],
    outstanding: &[ExtraDelivery],
) -> Result<BTreeMap<CatalogItemId, u32>> {
    merge_quantities(
        requirements
            .iter()
            .map(|r| (r.catalog_item_id, r.quantity))
            .chain(outstanding.iter().map(|d| (d.catalog_item_id, d.quantity))),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{CorrelationId, RoomId};
    use uuid::Uuid;

    use super::*;

    fn item(n: u128) -> CatalogItemId {
        CatalogItemId::from_uuid(Uuid::from_u128(n))
    }

    fn requirement(room_id: RoomId, catalog_item_id: CatalogItemId, quantity: u32) -> RoomLinenRequirement {
        RoomLinenRequirement {
            room_id,
            catalog_item_id,
            quantity,
        }
    }

    #[test]
    fn merge_sums_duplicates_and_drops_zeroes() {
        let merged = merge_quantities(vec![(item(2), 1), (item(1), 0), (item(2), 3)]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[&item(2)], 4);
    }

    #[test]
    fn merge_orders_by_item_id() {
        let merged = merge_quantities(vec![(item(3), 1), (item(1), 1), (item(2), 1)]).unwrap();
        let keys: Vec<_> = merged.keys().copied().collect();
        assert_eq!(keys, vec![item(1), item(2), item(3)]);
    }

    #[test]
    fn merge_rejects_sums_beyond_a_counter() {
        let result = merge_quantities(vec![(item(1), u32::MAX), (item(2), 1), (item(1), 1)]);
        assert!(matches!(result, Err(LedgerError::CounterOverflow(id)) if id == item(1)));
    }

    #[test]
    fn assignment_adds_outstanding_extras_to_base() {
        let room = RoomId::new();
        let requirements = vec![requirement(room, item(1), 2), requirement(room, item(2), 1)];
        let extras = vec![ExtraDelivery::new(
            room,
            item(1),
            1,
            None,
            Utc::now(),
            None,
            CorrelationId::new(),
        )];

        let assignment = room_assignment(&requirements, &extras).unwrap();
        assert_eq!(assignment[&item(1)], 3);
        assert_eq!(assignment[&item(2)], 1);
    }

    #[test]
    fn empty_inputs_give_empty_assignment() {
        assert!(room_assignment(&[], &[]).unwrap().is_empty());
    }
}
