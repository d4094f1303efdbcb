//! Row-level reads and writes, shared by the engine's transactional operations.
//!
//! Every function takes a `&Connection`; inside an operation that is the
//! open transaction (`Transaction` derefs to `Connection`).

use std::collections::HashMap;

use binstock_api::{
    Assignment, AssignmentId, Cabinet, CabinetId, Category, CategoryId, CellRef, ColumnCode,
    DrawerMerge, Item, ItemId, LocationId, MergeId, MergeRegion, Slot, SlotId,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{PlacementError, Result};

fn col_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ColumnCode> {
    let raw: String = row.get(idx)?;
    ColumnCode::new(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// =========================================================================
// Cabinets & categories
// =========================================================================

const CABINET_COLUMNS: &str = "id, location_id, name, rows_max, cols_max, compartments_per_slot";

fn cabinet_from_row(row: &Row<'_>) -> rusqlite::Result<Cabinet> {
    Ok(Cabinet {
        id: CabinetId(row.get(0)?),
        location_id: LocationId(row.get(1)?),
        name: row.get(2)?,
        rows_max: row.get(3)?,
        cols_max: col_at(row, 4)?,
        compartments_per_slot: row.get(5)?,
    })
}

pub fn load_cabinet(conn: &Connection, id: CabinetId) -> Result<Cabinet> {
    conn.query_row(
        &format!("SELECT {CABINET_COLUMNS} FROM cabinets WHERE id = ?1"),
        params![id.0],
        cabinet_from_row,
    )
    .optional()?
    .ok_or_else(|| PlacementError::not_found("cabinet", id.0))
}

pub fn list_cabinets(conn: &Connection) -> Result<Vec<Cabinet>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CABINET_COLUMNS} FROM cabinets ORDER BY name ASC"
    ))?;
    let cabinets = stmt
        .query_map([], cabinet_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cabinets)
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        name: row.get(1)?,
        color: row.get(2)?,
    })
}

pub fn load_category(conn: &Connection, id: CategoryId) -> Result<Category> {
    conn.query_row(
        "SELECT id, name, color FROM categories WHERE id = ?1",
        params![id.0],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| PlacementError::not_found("category", id.0))
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, color FROM categories ORDER BY name ASC")?;
    let categories = stmt
        .query_map([], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

// =========================================================================
// Slots
// =========================================================================

const SLOT_COLUMNS: &str =
    "id, cabinet_id, row_num, col_code, is_blocked, display_label, print_label, version";

fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: SlotId(row.get(0)?),
        cabinet_id: CabinetId(row.get(1)?),
        cell: CellRef {
            row: row.get(2)?,
            col: col_at(row, 3)?,
        },
        is_blocked: row.get(4)?,
        display_label: row.get(5)?,
        print_label: row.get(6)?,
        version: row.get(7)?,
    })
}

pub fn find_slot(conn: &Connection, cabinet_id: CabinetId, cell: CellRef) -> Result<Option<Slot>> {
    let slot = conn
        .query_row(
            &format!(
                "SELECT {SLOT_COLUMNS} FROM slots
                 WHERE cabinet_id = ?1 AND row_num = ?2 AND col_code = ?3"
            ),
            params![cabinet_id.0, cell.row, cell.col.code()],
            slot_from_row,
        )
        .optional()?;
    Ok(slot)
}

/// Fetch the slot for `cell`, creating it on first reference.
pub fn ensure_slot(conn: &Connection, cabinet_id: CabinetId, cell: CellRef) -> Result<Slot> {
    if let Some(slot) = find_slot(conn, cabinet_id, cell)? {
        return Ok(slot);
    }
    conn.execute(
        "INSERT INTO slots (cabinet_id, row_num, col_code) VALUES (?1, ?2, ?3)",
        params![cabinet_id.0, cell.row, cell.col.code()],
    )?;
    tracing::debug!("created slot {} in cabinet {}", cell, cabinet_id);
    Ok(Slot {
        id: SlotId(conn.last_insert_rowid()),
        cabinet_id,
        cell,
        is_blocked: false,
        display_label: None,
        print_label: None,
        version: 0,
    })
}

pub fn cabinet_slots(conn: &Connection, cabinet_id: CabinetId) -> Result<Vec<Slot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM slots WHERE cabinet_id = ?1 ORDER BY id ASC"
    ))?;
    let slots = stmt
        .query_map(params![cabinet_id.0], slot_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Every slot of every cabinet, paired with its cabinet.
pub fn all_slots(conn: &Connection) -> Result<Vec<(Slot, Cabinet)>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.cabinet_id, s.row_num, s.col_code, s.is_blocked,
                s.display_label, s.print_label, s.version,
                c.id, c.location_id, c.name, c.rows_max, c.cols_max, c.compartments_per_slot
         FROM slots s JOIN cabinets c ON s.cabinet_id = c.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let slot = slot_from_row(row)?;
            let cabinet = Cabinet {
                id: CabinetId(row.get(8)?),
                location_id: LocationId(row.get(9)?),
                name: row.get(10)?,
                rows_max: row.get(11)?,
                cols_max: col_at(row, 12)?,
                compartments_per_slot: row.get(13)?,
            };
            Ok((slot, cabinet))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_slot_blocked(conn: &Connection, slot_id: SlotId, blocked: bool) -> Result<()> {
    conn.execute(
        "UPDATE slots SET is_blocked = ?1, version = version + 1 WHERE id = ?2",
        params![blocked, slot_id.0],
    )?;
    Ok(())
}

pub fn set_slot_labels(
    conn: &Connection,
    slot_id: SlotId,
    display: Option<&str>,
    print: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE slots SET display_label = ?1, print_label = ?2 WHERE id = ?3",
        params![display, print, slot_id.0],
    )?;
    Ok(())
}

/// Mark a slot's assignment set as changed.
pub fn bump_version(conn: &Connection, slot_id: SlotId) -> Result<()> {
    conn.execute(
        "UPDATE slots SET version = version + 1 WHERE id = ?1",
        params![slot_id.0],
    )?;
    Ok(())
}

// =========================================================================
// Drawer merges
// =========================================================================

fn merge_from_row(row: &Row<'_>) -> rusqlite::Result<DrawerMerge> {
    Ok(DrawerMerge {
        id: MergeId(row.get(0)?),
        cabinet_id: CabinetId(row.get(1)?),
        region: MergeRegion::normalized(col_at(row, 4)?, col_at(row, 5)?, row.get(2)?, row.get(3)?),
    })
}

pub fn load_merges(conn: &Connection, cabinet_id: CabinetId) -> Result<Vec<DrawerMerge>> {
    let mut stmt = conn.prepare(
        "SELECT id, cabinet_id, row_start, row_end, col_start, col_end
         FROM drawer_merges WHERE cabinet_id = ?1 ORDER BY id ASC",
    )?;
    let merges = stmt
        .query_map(params![cabinet_id.0], merge_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merges)
}

pub fn load_merge(conn: &Connection, id: MergeId) -> Result<DrawerMerge> {
    conn.query_row(
        "SELECT id, cabinet_id, row_start, row_end, col_start, col_end
         FROM drawer_merges WHERE id = ?1",
        params![id.0],
        merge_from_row,
    )
    .optional()?
    .ok_or_else(|| PlacementError::not_found("merge", id.0))
}

pub fn insert_merge(conn: &Connection, cabinet_id: CabinetId, region: &MergeRegion) -> Result<MergeId> {
    conn.execute(
        "INSERT INTO drawer_merges (cabinet_id, row_start, row_end, col_start, col_end)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cabinet_id.0,
            region.row_start,
            region.row_end,
            region.col_start.code(),
            region.col_end.code()
        ],
    )?;
    Ok(MergeId(conn.last_insert_rowid()))
}

pub fn delete_merge(conn: &Connection, id: MergeId) -> Result<()> {
    conn.execute("DELETE FROM drawer_merges WHERE id = ?1", params![id.0])?;
    Ok(())
}

// =========================================================================
// Items
// =========================================================================

const ITEM_COLUMNS: &str =
    "id, category_id, name, thread_size, material, main_size_mm, quantity, share_drawer";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId(row.get(0)?),
        category_id: CategoryId(row.get(1)?),
        name: row.get(2)?,
        thread_size: row.get(3)?,
        material: row.get(4)?,
        main_size_mm: row.get(5)?,
        quantity: row.get(6)?,
        share_drawer: row.get(7)?,
    })
}

pub fn find_item(conn: &Connection, id: ItemId) -> Result<Option<Item>> {
    let item = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
            params![id.0],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

pub fn load_item(conn: &Connection, id: ItemId) -> Result<Item> {
    find_item(conn, id)?.ok_or_else(|| PlacementError::not_found("item", id.0))
}

/// Resolve the items referenced by `assignments`, in the same order.
///
/// Assignments whose item row has vanished are skipped.
pub fn items_for(conn: &Connection, assignments: &[Assignment]) -> Result<Vec<Item>> {
    let mut items = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        match find_item(conn, assignment.item_id)? {
            Some(item) => items.push(item),
            None => tracing::warn!(
                "assignment {} references missing item {}",
                assignment.id.0,
                assignment.item_id
            ),
        }
    }
    Ok(items)
}

/// Flip `share_drawer` on for every listed item.
pub fn grant_share_consent(conn: &Connection, ids: &[ItemId]) -> Result<()> {
    let mut stmt = conn.prepare("UPDATE items SET share_drawer = 1 WHERE id = ?1")?;
    for id in ids {
        stmt.execute(params![id.0])?;
    }
    Ok(())
}

/// Items without an assignment, ordered by category then identity.
pub fn unplaced_items(conn: &Connection, category: Option<CategoryId>) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM items
         WHERE id NOT IN (SELECT item_id FROM assignments)
           AND (?1 IS NULL OR category_id = ?1)
         ORDER BY category_id ASC, id ASC"
    ))?;
    let items = stmt
        .query_map(params![category.map(|c| c.0)], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

// =========================================================================
// Assignments
// =========================================================================

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: AssignmentId(row.get(0)?),
        slot_id: SlotId(row.get(1)?),
        compartment_no: row.get(2)?,
        item_id: ItemId(row.get(3)?),
    })
}

/// Assignments of a slot in insertion order.
pub fn slot_assignments(conn: &Connection, slot_id: SlotId) -> Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, slot_id, compartment_no, item_id FROM assignments
         WHERE slot_id = ?1 ORDER BY id ASC",
    )?;
    let assignments = stmt
        .query_map(params![slot_id.0], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assignments)
}

/// Assignment count per slot for one cabinet (slots without any are absent).
pub fn assignment_counts(conn: &Connection, cabinet_id: CabinetId) -> Result<HashMap<SlotId, u32>> {
    let mut stmt = conn.prepare(
        "SELECT a.slot_id, COUNT(*) FROM assignments a
         JOIN slots s ON a.slot_id = s.id
         WHERE s.cabinet_id = ?1
         GROUP BY a.slot_id",
    )?;
    let counts = stmt
        .query_map(params![cabinet_id.0], |row| {
            Ok((SlotId(row.get(0)?), row.get::<_, u32>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

pub fn item_assignment(conn: &Connection, item_id: ItemId) -> Result<Option<Assignment>> {
    let assignment = conn
        .query_row(
            "SELECT id, slot_id, compartment_no, item_id FROM assignments WHERE item_id = ?1",
            params![item_id.0],
            assignment_from_row,
        )
        .optional()?;
    Ok(assignment)
}

/// Delete an item's assignment, returning what was removed.
pub fn delete_item_assignment(conn: &Connection, item_id: ItemId) -> Result<Option<Assignment>> {
    let existing = item_assignment(conn, item_id)?;
    if let Some(assignment) = &existing {
        conn.execute("DELETE FROM assignments WHERE id = ?1", params![assignment.id.0])?;
    }
    Ok(existing)
}

/// Delete every assignment of a slot, returning the displaced items.
pub fn delete_slot_assignments(conn: &Connection, slot_id: SlotId) -> Result<Vec<ItemId>> {
    let displaced = slot_assignments(conn, slot_id)?
        .into_iter()
        .map(|a| a.item_id)
        .collect();
    conn.execute("DELETE FROM assignments WHERE slot_id = ?1", params![slot_id.0])?;
    Ok(displaced)
}

/// Append an assignment after the slot's highest compartment.
///
/// The final number is set by [`renumber`].
pub fn insert_assignment(conn: &Connection, slot_id: SlotId, item_id: ItemId) -> Result<AssignmentId> {
    conn.execute(
        "INSERT INTO assignments (slot_id, compartment_no, item_id, assigned_at)
         SELECT ?1, COALESCE(MAX(compartment_no), 0) + 1, ?2, ?3
         FROM assignments WHERE slot_id = ?1",
        params![slot_id.0, item_id.0, Utc::now().to_rfc3339()],
    )?;
    Ok(AssignmentId(conn.last_insert_rowid()))
}

/// Move assignments to another slot.
///
/// Moved rows get a parked (negative, unique) compartment number so they
/// cannot collide with the target's numbering before [`renumber`] runs.
pub fn reparent(conn: &Connection, ids: &[AssignmentId], slot_id: SlotId) -> Result<()> {
    let mut stmt =
        conn.prepare("UPDATE assignments SET slot_id = ?1, compartment_no = -id WHERE id = ?2")?;
    for id in ids {
        stmt.execute(params![slot_id.0, id.0])?;
    }
    Ok(())
}

/// Renumber a slot's compartments densely from 1 in insertion order.
///
/// Returns the number of assignments in the slot.
pub fn renumber(conn: &Connection, slot_id: SlotId) -> Result<u32> {
    conn.execute(
        "UPDATE assignments SET compartment_no = -id WHERE slot_id = ?1",
        params![slot_id.0],
    )?;
    let ids = {
        let mut stmt = conn.prepare("SELECT id FROM assignments WHERE slot_id = ?1 ORDER BY id ASC")?;
        stmt.query_map(params![slot_id.0], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?
    };
    let mut stmt = conn.prepare("UPDATE assignments SET compartment_no = ?1 WHERE id = ?2")?;
    for (n, id) in ids.iter().enumerate() {
        stmt.execute(params![n as i64 + 1, id])?;
    }
    tracing::debug!("renumbered {} compartments of slot {}", ids.len(), slot_id);
    Ok(ids.len() as u32)
}

/// Placement of an item as `(cabinet, cell)`, if any.
pub fn item_location(conn: &Connection, item_id: ItemId) -> Result<Option<(Cabinet, Slot)>> {
    let Some(assignment) = item_assignment(conn, item_id)? else {
        return Ok(None);
    };
    let slot = conn
        .query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?1"),
            params![assignment.slot_id.0],
            slot_from_row,
        )
        .optional()?
        .ok_or_else(|| PlacementError::not_found("slot", assignment.slot_id.0))?;
    let cabinet = load_cabinet(conn, slot.cabinet_id)?;
    Ok(Some((cabinet, slot)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Store;

    fn seeded() -> (Store, CabinetId, CategoryId) {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        conn.execute("INSERT INTO locations (name) VALUES ('Wall')", []).unwrap();
        conn.execute(
            "INSERT INTO cabinets (location_id, name, rows_max, cols_max, compartments_per_slot)
             VALUES (1, 'C1', 10, 'F', 6)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO categories (name) VALUES ('Screws')", []).unwrap();
        (store, CabinetId(1), CategoryId(1))
    }

    fn add_item(conn: &Connection, category: CategoryId) -> ItemId {
        conn.execute(
            "INSERT INTO items (category_id, name) VALUES (?1, 'x')",
            params![category.0],
        )
        .unwrap();
        ItemId(conn.last_insert_rowid())
    }

    #[test]
    fn test_ensure_slot_is_lazy_and_idempotent() {
        let (store, cabinet, _) = seeded();
        let cell = CellRef::parse("B", 3).unwrap();
        assert!(find_slot(store.conn(), cabinet, cell).unwrap().is_none());

        let first = ensure_slot(store.conn(), cabinet, cell).unwrap();
        let second = ensure_slot(store.conn(), cabinet, cell).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(cabinet_slots(store.conn(), cabinet).unwrap().len(), 1);
    }

    #[test]
    fn test_renumber_is_dense_after_delete() {
        let (store, cabinet, category) = seeded();
        let conn = store.conn();
        let slot = ensure_slot(conn, cabinet, CellRef::parse("A", 1).unwrap()).unwrap();
        let items: Vec<ItemId> = (0..3).map(|_| add_item(conn, category)).collect();
        for item in &items {
            insert_assignment(conn, slot.id, *item).unwrap();
        }

        delete_item_assignment(conn, items[0]).unwrap();
        assert_eq!(renumber(conn, slot.id).unwrap(), 2);

        let numbers: Vec<u32> = slot_assignments(conn, slot.id)
            .unwrap()
            .iter()
            .map(|a| a.compartment_no)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_reparent_does_not_collide() {
        let (store, cabinet, category) = seeded();
        let conn = store.conn();
        let a = ensure_slot(conn, cabinet, CellRef::parse("A", 1).unwrap()).unwrap();
        let b = ensure_slot(conn, cabinet, CellRef::parse("B", 1).unwrap()).unwrap();
        let first = insert_assignment(conn, a.id, add_item(conn, category)).unwrap();
        insert_assignment(conn, b.id, add_item(conn, category)).unwrap();

        reparent(conn, &[first], b.id).unwrap();
        renumber(conn, b.id).unwrap();

        let moved = slot_assignments(conn, b.id).unwrap();
        assert_eq!(moved.len(), 2);
        assert_eq!(moved[0].compartment_no, 1);
        assert_eq!(moved[0].id, first);
        assert!(slot_assignments(conn, a.id).unwrap().is_empty());
    }

    #[test]
    fn test_unplaced_items_filters_category() {
        let (store, cabinet, category) = seeded();
        let conn = store.conn();
        conn.execute("INSERT INTO categories (name) VALUES ('Nuts')", []).unwrap();
        let placed = add_item(conn, category);
        let loose = add_item(conn, category);
        add_item(conn, CategoryId(2));
        let slot = ensure_slot(conn, cabinet, CellRef::parse("A", 1).unwrap()).unwrap();
        insert_assignment(conn, slot.id, placed).unwrap();

        let unplaced = unplaced_items(conn, Some(category)).unwrap();
        assert_eq!(unplaced.iter().map(|i| i.id).collect::<Vec<_>>(), vec![loose]);
        assert_eq!(unplaced_items(conn, None).unwrap().len(), 2);
    }
}
