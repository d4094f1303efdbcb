//! Assign, clear, move and swap; block state; merge lifecycle.

use binstock_api::{
    CabinetId, CellRef, DrawerMerge, Item, ItemId, MergeId, PlacementEvent, Position, ShareCheck,
};
use rusqlite::Connection;
use serde::Serialize;

use super::compat::{categories_of, check_compat};
use super::Drawer;
use crate::error::{PlacementError, Result};
use crate::grid::{capacity_for, find_overlap, normalize_merge_bounds};
use crate::persistence::tables;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignOptions {
    /// Grant share consent on behalf of every blocking item.
    pub force_share: bool,
}

impl AssignOptions {
    pub fn forced() -> Self {
        Self { force_share: true }
    }
}

/// Where an item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placed {
    pub item_id: ItemId,
    pub position: Position,
    pub compartment_no: u32,
}

/// Place `item_id` into the drawer containing `cell`.
pub fn assign_position(
    conn: &Connection,
    item_id: ItemId,
    cabinet_id: CabinetId,
    cell: CellRef,
    options: AssignOptions,
    events: &mut Vec<PlacementEvent>,
) -> Result<Placed> {
    let item = tables::load_item(conn, item_id)?;
    let drawer = Drawer::open(conn, cabinet_id, cell)?;
    let anchor = drawer.resolved.anchor;

    if drawer.anchor.is_blocked {
        return Err(PlacementError::Blocked { cabinet_id, cell: anchor });
    }

    // Re-placing an item first removes it from wherever it was.
    if let Some(previous) = tables::delete_item_assignment(conn, item_id)? {
        if !drawer.slots().any(|s| s.id == previous.slot_id) {
            tables::renumber(conn, previous.slot_id)?;
            tables::bump_version(conn, previous.slot_id)?;
        }
    }

    let existing = drawer.assignments(conn)?;
    let occupants = tables::items_for(conn, &existing)?;
    match check_compat(&occupants, &item) {
        ShareCheck::Compatible => {}
        ShareCheck::Incompatible { reason } => {
            return Err(PlacementError::Incompatible { item_id, cell: anchor, reason });
        }
        ShareCheck::NeedsConsent { blockers } if options.force_share => {
            tables::grant_share_consent(conn, &blockers)?;
            tracing::info!("share consent granted for items {:?}", blockers);
            events.push(PlacementEvent::ShareConsentGranted { items: blockers });
        }
        ShareCheck::NeedsConsent { blockers } => {
            return Err(PlacementError::ShareRefused { blockers });
        }
    }

    let used = existing.len() as u32;
    if used >= drawer.capacity {
        return Err(PlacementError::CapacityExceeded {
            cell: anchor,
            capacity: drawer.capacity,
            used,
        });
    }

    drawer.consolidate(conn)?;
    tables::insert_assignment(conn, drawer.anchor.id, item_id)?;
    tables::renumber(conn, drawer.anchor.id)?;
    tables::bump_version(conn, drawer.anchor.id)?;
    drawer.verify(conn)?;

    let compartment_no = tables::item_assignment(conn, item_id)?
        .map(|a| a.compartment_no)
        .ok_or_else(|| PlacementError::not_found("assignment for item", item_id.0))?;
    let placed = Placed {
        item_id,
        position: drawer.position(),
        compartment_no,
    };
    tracing::info!(
        "item {} assigned to {}-{} compartment {}",
        item_id,
        drawer.cabinet.name,
        anchor,
        compartment_no
    );
    events.push(PlacementEvent::Assigned {
        item_id,
        position: placed.position,
        compartment_no,
    });
    Ok(placed)
}

/// Remove an item's placement. A no-op if it has none.
pub fn clear_position(
    conn: &Connection,
    item_id: ItemId,
    events: &mut Vec<PlacementEvent>,
) -> Result<Option<Position>> {
    let Some((cabinet, slot)) = tables::item_location(conn, item_id)? else {
        tracing::debug!("item {} has no placement to clear", item_id);
        return Ok(None);
    };
    tables::delete_item_assignment(conn, item_id)?;
    tables::renumber(conn, slot.id)?;
    tables::bump_version(conn, slot.id)?;

    let position = Position {
        cabinet_id: cabinet.id,
        cell: slot.cell,
    };
    tracing::info!("item {} cleared from {}-{}", item_id, cabinet.name, slot.cell);
    events.push(PlacementEvent::Cleared { item_id, position });
    Ok(Some(position))
}

/// Move the whole content of one drawer into another, or swap two drawers.
///
/// Returns the number of items that left the source drawer.
pub fn move_slot(
    conn: &Connection,
    from: Position,
    to: Position,
    swap: bool,
    events: &mut Vec<PlacementEvent>,
) -> Result<usize> {
    let src = Drawer::open(conn, from.cabinet_id, from.cell)?;
    let dst = Drawer::open(conn, to.cabinet_id, to.cell)?;
    if src.anchor.id == dst.anchor.id {
        return Err(PlacementError::validation(
            "destination",
            "source and destination are the same drawer",
        ));
    }

    if dst.anchor.is_blocked {
        return Err(PlacementError::Blocked {
            cabinet_id: to.cabinet_id,
            cell: dst.resolved.anchor,
        });
    }
    if src.anchor.is_blocked {
        return Err(PlacementError::Blocked {
            cabinet_id: from.cabinet_id,
            cell: src.resolved.anchor,
        });
    }

    let src_assigns = src.assignments(conn)?;
    if src_assigns.is_empty() {
        return Err(PlacementError::SourceEmpty {
            cell: src.resolved.anchor,
        });
    }
    let dst_assigns = dst.assignments(conn)?;
    let src_items = tables::items_for(conn, &src_assigns)?;
    let dst_items = tables::items_for(conn, &dst_assigns)?;

    if !dst_items.is_empty() {
        // A populated drawer only takes in its own category.
        let src_cats = categories_of(&src_items);
        let dst_cats = categories_of(&dst_items);
        if src_cats != dst_cats {
            return Err(PlacementError::CategoryMismatch {
                categories: src_cats.union(&dst_cats).copied().collect(),
            });
        }
        if !swap {
            let mut group = dst_items.clone();
            for item in &src_items {
                match check_compat(&group, item) {
                    ShareCheck::Compatible => group.push(item.clone()),
                    ShareCheck::Incompatible { reason } => {
                        return Err(PlacementError::Incompatible {
                            item_id: item.id,
                            cell: dst.resolved.anchor,
                            reason,
                        });
                    }
                    ShareCheck::NeedsConsent { blockers } => {
                        return Err(PlacementError::ShareRefused { blockers });
                    }
                }
            }
        }
    }

    let total = (src_assigns.len() + dst_assigns.len()) as u32;
    if total > dst.capacity {
        return Err(PlacementError::CapacityExceeded {
            cell: dst.resolved.anchor,
            capacity: dst.capacity,
            used: total,
        });
    }
    if swap && total > src.capacity {
        return Err(PlacementError::CapacityExceeded {
            cell: src.resolved.anchor,
            capacity: src.capacity,
            used: total,
        });
    }

    let src_ids: Vec<_> = src_assigns.iter().map(|a| a.id).collect();
    let dst_ids: Vec<_> = dst_assigns.iter().map(|a| a.id).collect();
    tables::reparent(conn, &src_ids, dst.anchor.id)?;
    if swap {
        tables::reparent(conn, &dst_ids, src.anchor.id)?;
    }
    for drawer in [&src, &dst] {
        for slot in drawer.slots() {
            tables::renumber(conn, slot.id)?;
            tables::bump_version(conn, slot.id)?;
        }
    }
    src.verify(conn)?;
    dst.verify(conn)?;

    tracing::info!(
        "{} {} items from {}-{} to {}-{}",
        if swap { "swapped" } else { "moved" },
        src_ids.len(),
        src.cabinet.name,
        src.resolved.anchor,
        dst.cabinet.name,
        dst.resolved.anchor
    );
    events.push(PlacementEvent::Moved {
        from: src.position(),
        to: dst.position(),
        swapped: swap,
        items: src_ids.len(),
    });
    Ok(src_ids.len())
}

/// Block or unblock the drawer containing `cell`, over its whole region.
pub fn set_blocked(
    conn: &Connection,
    cabinet_id: CabinetId,
    cell: CellRef,
    blocked: bool,
    events: &mut Vec<PlacementEvent>,
) -> Result<Vec<CellRef>> {
    let drawer = Drawer::open(conn, cabinet_id, cell)?;
    if blocked {
        let count = drawer.assignments(conn)?.len() as u32;
        if count > 0 {
            return Err(PlacementError::Occupied {
                cell: drawer.resolved.anchor,
                count,
            });
        }
    }

    let cells: Vec<CellRef> = drawer.slots().map(|s| s.cell).collect();
    for slot in drawer.slots() {
        tables::set_slot_blocked(conn, slot.id, blocked)?;
    }
    tracing::info!(
        "{} {} cells at {}-{}",
        if blocked { "blocked" } else { "unblocked" },
        cells.len(),
        drawer.cabinet.name,
        drawer.resolved.anchor
    );
    events.push(PlacementEvent::BlockChanged {
        cabinet_id,
        cells: cells.clone(),
        blocked,
    });
    Ok(cells)
}

/// Override the labels of the drawer containing `cell`. Empty strings clear.
pub fn set_slot_labels(
    conn: &Connection,
    cabinet_id: CabinetId,
    cell: CellRef,
    display: Option<&str>,
    print: Option<&str>,
) -> Result<()> {
    let drawer = Drawer::open(conn, cabinet_id, cell)?;
    fn clean(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    tables::set_slot_labels(conn, drawer.anchor.id, clean(display), clean(print))
}

/// Create a merge over the given bounds.
pub fn create_merge(
    conn: &Connection,
    cabinet_id: CabinetId,
    col_start: &str,
    col_end: &str,
    row_start: u32,
    row_end: u32,
    events: &mut Vec<PlacementEvent>,
) -> Result<DrawerMerge> {
    let cabinet = tables::load_cabinet(conn, cabinet_id)?;
    let region = normalize_merge_bounds(&cabinet, col_start, col_end, row_start, row_end)?;
    let merges = tables::load_merges(conn, cabinet_id)?;
    if let Some(existing) = find_overlap(&merges, &region) {
        return Err(PlacementError::MergeOverlap { existing });
    }

    let id = tables::insert_merge(conn, cabinet_id, &region)?;
    let merge = DrawerMerge {
        id,
        cabinet_id,
        region,
    };
    let drawer = Drawer::open_in(conn, cabinet, std::slice::from_ref(&merge), region.anchor())?;

    let occupants = tables::items_for(conn, &drawer.assignments(conn)?)?;
    if drawer.any_blocked() {
        if !occupants.is_empty() {
            return Err(PlacementError::InUse(format!(
                "region {}:{} mixes blocked and occupied cells",
                region.anchor(),
                CellRef {
                    col: region.col_end,
                    row: region.row_end
                }
            )));
        }
        for slot in drawer.slots().filter(|s| !s.is_blocked) {
            tables::set_slot_blocked(conn, slot.id, true)?;
        }
        tracing::debug!("merge {} covers blocked cells; whole region blocked", id);
    }

    // The merged drawer must satisfy the same sharing rule as assignment.
    let mut sharing: Vec<Item> = Vec::with_capacity(occupants.len());
    for item in occupants {
        match check_compat(&sharing, &item) {
            ShareCheck::Compatible => sharing.push(item),
            ShareCheck::Incompatible { reason } => {
                return Err(PlacementError::Incompatible {
                    item_id: item.id,
                    cell: region.anchor(),
                    reason,
                });
            }
            ShareCheck::NeedsConsent { blockers } => {
                return Err(PlacementError::InUse(format!(
                    "items {:?} have not consented to sharing the merged drawer",
                    blockers
                )));
            }
        }
    }

    if drawer.consolidate(conn)? > 0 {
        tables::renumber(conn, drawer.anchor.id)?;
        tables::bump_version(conn, drawer.anchor.id)?;
    }
    drawer.verify(conn)?;

    tracing::info!(
        "merged {} cells of {} into drawer at {}",
        region.cell_count(),
        drawer.cabinet.name,
        region.anchor()
    );
    events.push(PlacementEvent::MergeCreated {
        merge_id: id,
        cabinet_id,
        region,
    });
    Ok(merge)
}

/// Delete a merge; its cells become independent slots again.
pub fn delete_merge(
    conn: &Connection,
    merge_id: MergeId,
    events: &mut Vec<PlacementEvent>,
) -> Result<()> {
    let merge = tables::load_merge(conn, merge_id)?;
    let cabinet = tables::load_cabinet(conn, merge.cabinet_id)?;
    let base = capacity_for(&cabinet, None);
    if let Some(anchor) = tables::find_slot(conn, cabinet.id, merge.region.anchor())? {
        let used = tables::slot_assignments(conn, anchor.id)?.len() as u32;
        if used > base {
            return Err(PlacementError::InUse(format!(
                "drawer at {} holds {} items, more than a single cell's {}",
                anchor.cell, used, base
            )));
        }
    }

    tables::delete_merge(conn, merge_id)?;
    tracing::info!("merge {} removed from {}", merge_id, cabinet.name);
    events.push(PlacementEvent::MergeDeleted {
        merge_id,
        cabinet_id: cabinet.id,
    });
    Ok(())
}
