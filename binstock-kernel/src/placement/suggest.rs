//! Read-only placement queries: first-fit suggestion and the share dry run.

use std::collections::HashMap;

use binstock_api::{CabinetId, CellRef, DrawerMerge, ItemId, Position, ShareCheck};
use rusqlite::Connection;

use super::check_bounds;
use super::compat::check_compat;
use crate::error::Result;
use crate::grid::{capacity_for, merge_region_for, resolve};
use crate::persistence::tables;

/// First drawer, in (cabinet name, column, row) order, that already holds
/// items the given item may join and still has room.
///
/// Empty cells and the item's own drawer are never suggested.
pub fn suggest_position(conn: &Connection, item_id: ItemId) -> Result<Option<Position>> {
    let item = tables::load_item(conn, item_id)?;

    let mut slots = tables::all_slots(conn)?;
    slots.sort_by(|(a, ca), (b, cb)| {
        ca.name
            .cmp(&cb.name)
            .then(a.cell.col.cmp(&b.cell.col))
            .then(a.cell.row.cmp(&b.cell.row))
    });

    let mut merges: HashMap<CabinetId, Vec<DrawerMerge>> = HashMap::new();
    for (slot, cabinet) in &slots {
        if slot.is_blocked {
            continue;
        }
        let assignments = tables::slot_assignments(conn, slot.id)?;
        if assignments.is_empty() || assignments.iter().any(|a| a.item_id == item_id) {
            continue;
        }

        let occupants = tables::items_for(conn, &assignments)?;
        if !check_compat(&occupants, &item).is_compatible() {
            continue;
        }

        if !merges.contains_key(&cabinet.id) {
            merges.insert(cabinet.id, tables::load_merges(conn, cabinet.id)?);
        }
        let region = merges
            .get(&cabinet.id)
            .and_then(|m| merge_region_for(m, slot.cell));
        let capacity = capacity_for(cabinet, region.as_ref());
        if (assignments.len() as u32) < capacity {
            tracing::debug!("suggesting {}-{} for item {}", cabinet.name, slot.cell, item_id);
            return Ok(Some(Position {
                cabinet_id: cabinet.id,
                cell: slot.cell,
            }));
        }
    }
    Ok(None)
}

/// Whether `item_id` could join the drawer containing `cell`, without
/// changing anything.
pub fn check_share(
    conn: &Connection,
    item_id: ItemId,
    cabinet_id: CabinetId,
    cell: CellRef,
) -> Result<ShareCheck> {
    let item = tables::load_item(conn, item_id)?;
    let cabinet = tables::load_cabinet(conn, cabinet_id)?;
    check_bounds(&cabinet, cell)?;
    let merges = tables::load_merges(conn, cabinet_id)?;

    let mut assignments = Vec::new();
    for c in resolve(&merges, cell).cells() {
        if let Some(slot) = tables::find_slot(conn, cabinet_id, c)? {
            assignments.extend(
                tables::slot_assignments(conn, slot.id)?
                    .into_iter()
                    .filter(|a| a.item_id != item_id),
            );
        }
    }
    let occupants = tables::items_for(conn, &assignments)?;
    Ok(check_compat(&occupants, &item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::assign::{assign_position, AssignOptions};
    use crate::test_utils::Fixture;

    fn place(fx: &Fixture, item: ItemId, col: &str, row: u32) {
        let mut events = Vec::new();
        assign_position(fx.conn(), item, fx.cabinet, fx.cell(col, row), AssignOptions::default(), &mut events)
            .unwrap();
    }

    #[test]
    fn test_suggest_skips_empty_and_incompatible() {
        let fx = Fixture::new();
        let m4 = fx.item("M4", true);
        let m3 = fx.item("M3", true);
        place(&fx, m4, "A", 1);
        place(&fx, m3, "B", 1);

        let candidate = fx.item("M3", true);
        assert_eq!(
            suggest_position(fx.conn(), candidate).unwrap(),
            Some(fx.at("B", 1))
        );

        let loner = fx.item("M8", true);
        assert_eq!(suggest_position(fx.conn(), loner).unwrap(), None);
    }

    #[test]
    fn test_suggest_orders_by_column_index() {
        let fx = Fixture::new();
        fx.conn()
            .execute("UPDATE cabinets SET cols_max = 'AB'", [])
            .unwrap();
        let first = fx.item("M3", true);
        let second = fx.item("M3", true);
        place(&fx, first, "AA", 1);
        place(&fx, second, "C", 1);

        let candidate = fx.item("M3", true);
        assert_eq!(
            suggest_position(fx.conn(), candidate).unwrap(),
            Some(fx.at("C", 1))
        );
    }

    #[test]
    fn test_suggest_skips_full() {
        let fx = Fixture::with_compartments(1);
        let placed = fx.item("M3", true);
        place(&fx, placed, "A", 1);
        let candidate = fx.item("M3", true);
        assert_eq!(suggest_position(fx.conn(), candidate).unwrap(), None);
    }

    #[test]
    fn test_suggest_skips_own_drawer() {
        let fx = Fixture::new();
        let neighbour = fx.item("M3", true);
        let placed = fx.item("M3", true);
        place(&fx, neighbour, "A", 1);
        place(&fx, placed, "A", 1);
        assert_eq!(suggest_position(fx.conn(), placed).unwrap(), None);

        let other = fx.item("M3", true);
        place(&fx, other, "C", 2);
        assert_eq!(suggest_position(fx.conn(), placed).unwrap(), Some(fx.at("C", 2)));
    }

    #[test]
    fn test_check_share_reports_blockers() {
        let fx = Fixture::new();
        let shy = fx.item("M3", false);
        place(&fx, shy, "D", 4);

        let candidate = fx.item("M3", true);
        assert_eq!(
            check_share(fx.conn(), candidate, fx.cabinet, fx.cell("D", 4)).unwrap(),
            ShareCheck::NeedsConsent { blockers: vec![shy] }
        );
        assert_eq!(
            check_share(fx.conn(), candidate, fx.cabinet, fx.cell("E", 4)).unwrap(),
            ShareCheck::Compatible
        );
    }
}
