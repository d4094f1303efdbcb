//! Minimal records the engine places against: locations, cabinets,
//! categories, items.

use binstock_api::{
    Cabinet, CabinetId, Category, CategoryId, Item, ItemId, Location, LocationId, NewCabinet,
    NewItem, MAX_ROWS,
};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{PlacementError, Result};
use crate::grid::{capacity_for, merge_region_for};
use crate::persistence::tables;

fn clean_name(field: &'static str, raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.chars().count() < 2 {
        return Err(PlacementError::validation(field, "must be at least 2 characters"));
    }
    Ok(name.to_string())
}

/// Whether another row of `table` already uses `name`.
fn name_taken(conn: &Connection, table: &str, name: &str, except: Option<i64>) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE name = ?1 AND (?2 IS NULL OR id != ?2)"),
            params![name, except],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn count(conn: &Connection, sql: &str, id: i64) -> Result<i64> {
    Ok(conn.query_row(sql, params![id], |row| row.get(0))?)
}

// =========================================================================
// Locations
// =========================================================================

pub fn add_location(conn: &Connection, name: &str) -> Result<Location> {
    let name = clean_name("name", name)?;
    if name_taken(conn, "locations", &name, None)? {
        return Err(PlacementError::validation("name", format!("location {:?} already exists", name)));
    }
    conn.execute("INSERT INTO locations (name) VALUES (?1)", params![name])?;
    Ok(Location {
        id: LocationId(conn.last_insert_rowid()),
        name,
    })
}

pub fn rename_location(conn: &Connection, id: LocationId, name: &str) -> Result<Location> {
    let name = clean_name("name", name)?;
    load_location(conn, id)?;
    if name_taken(conn, "locations", &name, Some(id.0))? {
        return Err(PlacementError::validation("name", format!("location {:?} already exists", name)));
    }
    conn.execute("UPDATE locations SET name = ?1 WHERE id = ?2", params![name, id.0])?;
    Ok(Location { id, name })
}

pub fn delete_location(conn: &Connection, id: LocationId) -> Result<()> {
    load_location(conn, id)?;
    let cabinets = count(conn, "SELECT COUNT(*) FROM cabinets WHERE location_id = ?1", id.0)?;
    if cabinets > 0 {
        return Err(PlacementError::InUse(format!(
            "location {} still holds {} cabinets",
            id, cabinets
        )));
    }
    conn.execute("DELETE FROM locations WHERE id = ?1", params![id.0])?;
    Ok(())
}

pub fn load_location(conn: &Connection, id: LocationId) -> Result<Location> {
    conn.query_row(
        "SELECT id, name FROM locations WHERE id = ?1",
        params![id.0],
        |row| {
            Ok(Location {
                id: LocationId(row.get(0)?),
                name: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| PlacementError::not_found("location", id.0))
}

pub fn list_locations(conn: &Connection) -> Result<Vec<Location>> {
    let mut stmt = conn.prepare("SELECT id, name FROM locations ORDER BY name ASC")?;
    let locations = stmt
        .query_map([], |row| {
            Ok(Location {
                id: LocationId(row.get(0)?),
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(locations)
}

// =========================================================================
// Cabinets
// =========================================================================

fn validate_cabinet(conn: &Connection, fields: &NewCabinet, except: Option<CabinetId>) -> Result<String> {
    let name = clean_name("name", &fields.name)?;
    if name_taken(conn, "cabinets", &name, except.map(|c| c.0))? {
        return Err(PlacementError::validation("name", format!("cabinet {:?} already exists", name)));
    }
    if !(1..=MAX_ROWS).contains(&fields.rows_max) {
        return Err(PlacementError::validation(
            "rows_max",
            format!("{} outside 1..={}", fields.rows_max, MAX_ROWS),
        ));
    }
    if fields.compartments_per_slot < 1 {
        return Err(PlacementError::validation("compartments_per_slot", "must be at least 1"));
    }
    load_location(conn, fields.location_id)?;
    Ok(name)
}

pub fn add_cabinet(conn: &Connection, fields: &NewCabinet) -> Result<Cabinet> {
    let name = validate_cabinet(conn, fields, None)?;
    conn.execute(
        "INSERT INTO cabinets (location_id, name, rows_max, cols_max, compartments_per_slot)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            fields.location_id.0,
            name,
            fields.rows_max,
            fields.cols_max.code(),
            fields.compartments_per_slot
        ],
    )?;
    let id = CabinetId(conn.last_insert_rowid());
    tracing::info!("cabinet {} created ({} x A..{})", name, fields.rows_max, fields.cols_max);
    tables::load_cabinet(conn, id)
}

/// Replace a cabinet's fields. Shrinking past an existing slot or merge is
/// rejected.
pub fn update_cabinet(conn: &Connection, id: CabinetId, fields: &NewCabinet) -> Result<Cabinet> {
    tables::load_cabinet(conn, id)?;
    let name = validate_cabinet(conn, fields, Some(id))?;

    let resized = Cabinet {
        id,
        location_id: fields.location_id,
        name: name.clone(),
        rows_max: fields.rows_max,
        cols_max: fields.cols_max,
        compartments_per_slot: fields.compartments_per_slot,
    };
    let slots = tables::cabinet_slots(conn, id)?;
    if let Some(slot) = slots.iter().find(|s| !resized.contains(s.cell)) {
        return Err(PlacementError::InUse(format!(
            "slot {} would fall outside the new bounds",
            slot.cell
        )));
    }
    let merges = tables::load_merges(conn, id)?;
    for merge in &merges {
        if merge.region.row_end > resized.rows_max || merge.region.col_end > resized.cols_max {
            return Err(PlacementError::InUse(format!(
                "merge {} would fall outside the new bounds",
                merge.id
            )));
        }
    }
    // Occupied drawers must still fit under the new compartment count.
    for slot in &slots {
        let used = tables::slot_assignments(conn, slot.id)?.len() as u32;
        if used == 0 {
            continue;
        }
        let region = merge_region_for(&merges, slot.cell);
        let capacity = capacity_for(&resized, region.as_ref());
        if used > capacity {
            return Err(PlacementError::InUse(format!(
                "drawer at {} holds {} items, more than the new capacity of {}",
                slot.cell, used, capacity
            )));
        }
    }

    conn.execute(
        "UPDATE cabinets SET location_id = ?1, name = ?2, rows_max = ?3, cols_max = ?4,
                compartments_per_slot = ?5
         WHERE id = ?6",
        params![
            fields.location_id.0,
            name,
            fields.rows_max,
            fields.cols_max.code(),
            fields.compartments_per_slot,
            id.0
        ],
    )?;
    Ok(resized)
}

pub fn delete_cabinet(conn: &Connection, id: CabinetId) -> Result<()> {
    let cabinet = tables::load_cabinet(conn, id)?;
    let slots = count(conn, "SELECT COUNT(*) FROM slots WHERE cabinet_id = ?1", id.0)?;
    if slots > 0 {
        return Err(PlacementError::InUse(format!(
            "cabinet {} still has {} slots",
            cabinet.name, slots
        )));
    }
    conn.execute("DELETE FROM drawer_merges WHERE cabinet_id = ?1", params![id.0])?;
    conn.execute("DELETE FROM cabinets WHERE id = ?1", params![id.0])?;
    tracing::info!("cabinet {} deleted", cabinet.name);
    Ok(())
}

// =========================================================================
// Categories
// =========================================================================

fn valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn add_category(conn: &Connection, name: &str, color: &str) -> Result<Category> {
    let name = clean_name("name", name)?;
    let color = color.trim();
    if !valid_color(color) {
        return Err(PlacementError::validation("color", format!("{:?} is not #RRGGBB", color)));
    }
    if name_taken(conn, "categories", &name, None)? {
        return Err(PlacementError::validation("name", format!("category {:?} already exists", name)));
    }
    conn.execute(
        "INSERT INTO categories (name, color) VALUES (?1, ?2)",
        params![name, color],
    )?;
    Ok(Category {
        id: CategoryId(conn.last_insert_rowid()),
        name,
        color: color.to_string(),
    })
}

pub fn delete_category(conn: &Connection, id: CategoryId) -> Result<()> {
    let category = tables::load_category(conn, id)?;
    let items = count(conn, "SELECT COUNT(*) FROM items WHERE category_id = ?1", id.0)?;
    if items > 0 {
        return Err(PlacementError::InUse(format!(
            "category {} still has {} items",
            category.name, items
        )));
    }
    conn.execute("DELETE FROM categories WHERE id = ?1", params![id.0])?;
    Ok(())
}

// =========================================================================
// Items
// =========================================================================

fn validate_item(conn: &Connection, fields: &NewItem) -> Result<()> {
    tables::load_category(conn, fields.category_id)?;
    if fields.quantity < 0 {
        return Err(PlacementError::validation("quantity", "must not be negative"));
    }
    if fields.main_size_mm.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(PlacementError::validation("main_size_mm", "must be a non-negative number"));
    }
    Ok(())
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn add_item(conn: &Connection, fields: &NewItem) -> Result<Item> {
    validate_item(conn, fields)?;
    conn.execute(
        "INSERT INTO items (category_id, name, thread_size, material, main_size_mm, quantity, share_drawer)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            fields.category_id.0,
            fields.name.trim(),
            trimmed(&fields.thread_size),
            trimmed(&fields.material),
            fields.main_size_mm,
            fields.quantity,
            fields.share_drawer
        ],
    )?;
    tables::load_item(conn, ItemId(conn.last_insert_rowid()))
}

pub fn update_item(conn: &Connection, id: ItemId, fields: &NewItem) -> Result<Item> {
    tables::load_item(conn, id)?;
    validate_item(conn, fields)?;
    conn.execute(
        "UPDATE items SET category_id = ?1, name = ?2, thread_size = ?3, material = ?4,
                main_size_mm = ?5, quantity = ?6, share_drawer = ?7
         WHERE id = ?8",
        params![
            fields.category_id.0,
            fields.name.trim(),
            trimmed(&fields.thread_size),
            trimmed(&fields.material),
            fields.main_size_mm,
            fields.quantity,
            fields.share_drawer,
            id.0
        ],
    )?;
    tables::load_item(conn, id)
}

/// Delete an item together with its placement.
pub fn delete_item(conn: &Connection, id: ItemId) -> Result<()> {
    tables::load_item(conn, id)?;
    if let Some(assignment) = tables::delete_item_assignment(conn, id)? {
        tables::renumber(conn, assignment.slot_id)?;
        tables::bump_version(conn, assignment.slot_id)?;
    }
    conn.execute("DELETE FROM items WHERE id = ?1", params![id.0])?;
    Ok(())
}
