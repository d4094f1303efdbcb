//! Read-only queries returning plain value structs.

use std::collections::HashMap;

use binstock_api::{
    iter_cols_upto, Cabinet, CabinetId, CategoryId, CellRef, GridCell, GridEntry, GridView, Item,
    ItemId, LabelTarget, SlotContents, SlotEntry, Slot, MAX_ROWS,
};
use indexmap::IndexMap;
use rusqlite::Connection;

use crate::error::Result;
use crate::grid::{capacity_for, resolve};
use crate::persistence::tables;
use crate::placement::check_bounds;
use crate::roles::{CategoryRoles, ROLE_WASHER};

/// `"{Cabinet}-{Label}"`.
///
/// The display label falls back to `"{Col}{Row}"`; the print label falls
/// back to the display override first.
pub fn position_label(cabinet: &Cabinet, cell: CellRef, slot: Option<&Slot>, target: LabelTarget) -> String {
    let display = slot.and_then(|s| s.display_label.as_deref());
    let label = match target {
        LabelTarget::Display => display,
        LabelTarget::Print => slot.and_then(|s| s.print_label.as_deref()).or(display),
    };
    match label {
        Some(label) => format!("{}-{}", cabinet.name, label),
        None => format!("{}-{}", cabinet.name, cell),
    }
}

/// What the drawer containing `cell` holds, in compartment order.
pub fn slot_contents(conn: &Connection, cabinet_id: CabinetId, cell: CellRef) -> Result<SlotContents> {
    let cabinet = tables::load_cabinet(conn, cabinet_id)?;
    check_bounds(&cabinet, cell)?;
    let merges = tables::load_merges(conn, cabinet_id)?;
    let resolved = resolve(&merges, cell);

    let anchor_slot = tables::find_slot(conn, cabinet_id, resolved.anchor)?;
    let mut assignments = Vec::new();
    for c in resolved.cells() {
        if let Some(slot) = tables::find_slot(conn, cabinet_id, c)? {
            assignments.extend(tables::slot_assignments(conn, slot.id)?);
        }
    }
    let anchor_id = anchor_slot.as_ref().map(|s| s.id);
    assignments.sort_by_key(|a| (Some(a.slot_id) != anchor_id, a.compartment_no));

    let mut entries = Vec::with_capacity(assignments.len());
    for assignment in &assignments {
        if let Some(item) = tables::find_item(conn, assignment.item_id)? {
            entries.push(SlotEntry {
                compartment_no: assignment.compartment_no,
                item,
            });
        }
    }

    Ok(SlotContents {
        cabinet_id,
        cell,
        anchor: resolved.anchor,
        region: resolved.region,
        label: position_label(&cabinet, resolved.anchor, anchor_slot.as_ref(), LabelTarget::Display),
        print_label: position_label(&cabinet, resolved.anchor, anchor_slot.as_ref(), LabelTarget::Print),
        blocked: anchor_slot.as_ref().is_some_and(|s| s.is_blocked),
        capacity: capacity_for(&cabinet, resolved.region.as_ref()),
        entries,
    })
}

/// Display label of the item's current placement.
pub fn item_position(conn: &Connection, item_id: ItemId) -> Result<Option<String>> {
    tables::load_item(conn, item_id)?;
    Ok(tables::item_location(conn, item_id)?
        .map(|(cabinet, slot)| position_label(&cabinet, slot.cell, Some(&slot), LabelTarget::Display)))
}

pub fn unplaced_items(conn: &Connection, category: Option<CategoryId>) -> Result<Vec<Item>> {
    tables::unplaced_items(conn, category)
}

/// Short caption for a grid entry: measure and main size, at most two parts.
pub fn short_caption(item: &Item, is_washer: bool) -> String {
    let mut parts = Vec::new();
    if let Some(measure) = item.thread_size.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(measure.to_string());
    }
    if let Some(size) = item.main_size_mm.filter(|v| *v > 0.0) {
        let tag = if is_washer { "Øe" } else { "L=" };
        parts.push(format!("{}{}", tag, format_mm(size)));
    }
    parts.truncate(2);
    parts.join(" · ")
}

fn format_mm(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// The whole grid of a cabinet, with every blocked or occupied cell.
pub fn cabinet_grid(conn: &Connection, roles: &CategoryRoles, cabinet_id: CabinetId) -> Result<GridView> {
    let cabinet = tables::load_cabinet(conn, cabinet_id)?;
    let merges = tables::load_merges(conn, cabinet_id)?;
    let colors: HashMap<CategoryId, String> = tables::list_categories(conn)?
        .into_iter()
        .map(|c| (c.id, c.color))
        .collect();
    let washer = roles.resolve(conn, ROLE_WASHER)?;

    let mut slots = tables::cabinet_slots(conn, cabinet_id)?;
    slots.sort_by_key(|s| (s.cell.row, s.cell.col));

    let mut cells = IndexMap::new();
    for slot in &slots {
        let region = merges
            .iter()
            .map(|m| m.region)
            .find(|r| r.anchor() == slot.cell);
        let assignments = tables::slot_assignments(conn, slot.id)?;
        if !slot.is_blocked && assignments.is_empty() && region.is_none() {
            continue;
        }

        let mut cell = GridCell {
            blocked: slot.is_blocked,
            region,
            ..GridCell::default()
        };
        for item in tables::items_for(conn, &assignments)? {
            cell.entries.push(GridEntry {
                item_id: item.id,
                text: short_caption(&item, washer == Some(item.category_id)),
                color: colors
                    .get(&item.category_id)
                    .cloned()
                    .unwrap_or_else(|| "#999999".to_string()),
            });
            cell.category_id.get_or_insert(item.category_id);
        }
        cells.insert(GridView::cell_key(slot.cell), cell);
    }

    Ok(GridView {
        cabinet_id,
        cabinet_name: cabinet.name.clone(),
        compartments_per_slot: cabinet.compartments_per_slot,
        rows: (1..=cabinet.rows_max.min(MAX_ROWS)).collect(),
        cols: iter_cols_upto(cabinet.cols_max).collect(),
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::assign::{assign_position, create_merge, set_slot_labels, AssignOptions};
    use crate::test_utils::Fixture;

    fn item(measure: Option<&str>, size: Option<f64>) -> Item {
        Item {
            id: ItemId(1),
            category_id: CategoryId(1),
            name: String::new(),
            thread_size: measure.map(String::from),
            material: None,
            main_size_mm: size,
            quantity: 0,
            share_drawer: true,
        }
    }

    #[test]
    fn test_short_caption() {
        assert_eq!(short_caption(&item(Some("M3"), Some(12.0)), false), "M3 · L=12");
        assert_eq!(short_caption(&item(Some("M3"), Some(6.4)), true), "M3 · Øe6.4");
        assert_eq!(short_caption(&item(None, None), false), "");
    }

    #[test]
    fn test_labels_fall_back() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let cabinet = tables::load_cabinet(conn, fx.cabinet).unwrap();
        let cell = fx.cell("B", 7);
        assert_eq!(position_label(&cabinet, cell, None, LabelTarget::Print), "C1-B7");

        set_slot_labels(conn, fx.cabinet, cell, Some("Top"), None).unwrap();
        let slot = tables::find_slot(conn, fx.cabinet, cell).unwrap();
        assert_eq!(position_label(&cabinet, cell, slot.as_ref(), LabelTarget::Print), "C1-Top");

        set_slot_labels(conn, fx.cabinet, cell, Some("Top"), Some("P-7")).unwrap();
        let slot = tables::find_slot(conn, fx.cabinet, cell).unwrap();
        assert_eq!(position_label(&cabinet, cell, slot.as_ref(), LabelTarget::Print), "C1-P-7");
        assert_eq!(position_label(&cabinet, cell, slot.as_ref(), LabelTarget::Display), "C1-Top");

        set_slot_labels(conn, fx.cabinet, cell, Some(" Top "), Some("   ")).unwrap();
        let slot = tables::find_slot(conn, fx.cabinet, cell).unwrap();
        assert_eq!(position_label(&cabinet, cell, slot.as_ref(), LabelTarget::Print), "C1-Top");
    }

    #[test]
    fn test_slot_contents_redirects() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let mut events = Vec::new();
        create_merge(conn, fx.cabinet, "A", "C", 1, 2, &mut events).unwrap();
        let item = fx.item("M3", true);
        assign_position(conn, item, fx.cabinet, fx.cell("C", 2), AssignOptions::default(), &mut events)
            .unwrap();

        let contents = slot_contents(conn, fx.cabinet, fx.cell("B", 2)).unwrap();
        assert!(contents.redirected());
        assert_eq!(contents.anchor, fx.cell("A", 1));
        assert_eq!(contents.capacity, 36);
        assert_eq!(contents.used(), 1);
        assert_eq!(contents.label, "C1-A1");
        assert_eq!(item_position(conn, item).unwrap().as_deref(), Some("C1-A1"));
    }

    #[test]
    fn test_grid_lists_nontrivial_cells() {
        let fx = Fixture::new();
        let conn = fx.conn();
        let mut events = Vec::new();
        let item = fx.item("M3", true);
        assign_position(conn, item, fx.cabinet, fx.cell("B", 2), AssignOptions::default(), &mut events)
            .unwrap();
        crate::placement::assign::set_blocked(conn, fx.cabinet, fx.cell("A", 1), true, &mut events).unwrap();

        let roles = CategoryRoles::new(HashMap::new());
        let grid = cabinet_grid(conn, &roles, fx.cabinet).unwrap();
        assert_eq!(grid.rows.len(), 10);
        assert_eq!(grid.cols.len(), 6);
        assert_eq!(grid.cells.len(), 2);
        assert!(grid.cell(fx.cell("A", 1)).unwrap().blocked);
        let occupied = grid.cell(fx.cell("B", 2)).unwrap();
        assert_eq!(occupied.entries[0].text, "M3");
        assert_eq!(occupied.entries[0].color, "#3366ff");
        assert_eq!(occupied.category_id, Some(fx.category));
    }
}
