//! Bulk auto-assignment along a sweep of the grid.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use binstock_api::{
    AutoAssignReport, AutoAssignRequest, CellRef, Item, PlacementEvent, SortKey,
};
use rusqlite::Connection;

use super::assign::{assign_position, AssignOptions};
use super::compat::check_compat;
use super::{check_bounds, Drawer};
use crate::error::{PlacementError, Result};
use crate::grid::{capacity_for, resolve, walk_path};
use crate::persistence::tables;

/// A drawer on the path that can take items.
struct Candidate {
    anchor: CellRef,
    /// Every cell of the drawer, anchor first.
    cells: Vec<CellRef>,
    capacity: u32,
    /// Items the plan puts here.
    planned: Vec<Item>,
    /// Existing content must be deleted before the plan runs.
    reclaim: bool,
}

impl Candidate {
    fn has_room(&self) -> bool {
        (self.planned.len() as u32) < self.capacity
    }

    fn accepts(&self, item: &Item) -> bool {
        self.has_room() && check_compat(&self.planned, item).is_compatible()
    }
}

/// Place up to `request.count` unplaced items of a category, walking the
/// cabinet from `request.start`.
///
/// Fewer placements than requested is a normal outcome, reported through
/// [`AutoAssignReport::is_partial`]. Placing nothing at all is an error.
pub fn auto_assign_category(
    conn: &Connection,
    request: &AutoAssignRequest,
    events: &mut Vec<PlacementEvent>,
) -> Result<AutoAssignReport> {
    if request.count == 0 {
        return Err(PlacementError::validation("count", "must be at least 1"));
    }
    tables::load_category(conn, request.category_id)?;
    let cabinet = tables::load_cabinet(conn, request.cabinet_id)?;
    check_bounds(&cabinet, request.start)?;

    let mut working = tables::unplaced_items(conn, Some(request.category_id))?;
    if working.is_empty() {
        return Err(PlacementError::NothingToPlace {
            category_id: request.category_id,
        });
    }
    working.sort_by(|a, b| {
        compare_by(request.primary, a, b)
            .then_with(|| compare_by(request.secondary, a, b))
            .then(a.id.cmp(&b.id))
    });
    working.truncate(request.count as usize);
    let requested = working.len() as u32;

    // Current state of the cabinet, read once.
    let merges = tables::load_merges(conn, cabinet.id)?;
    let slots: HashMap<CellRef, _> = tables::cabinet_slots(conn, cabinet.id)?
        .into_iter()
        .map(|s| (s.cell, s))
        .collect();
    let counts = tables::assignment_counts(conn, cabinet.id)?;
    let used_at = |cell: &CellRef| -> u32 {
        slots
            .get(cell)
            .and_then(|s| counts.get(&s.id))
            .copied()
            .unwrap_or(0)
    };

    let mut candidates = Vec::new();
    let mut visited = HashSet::new();
    let mut collisions = 0u32;
    for cell in walk_path(&cabinet, request.start, request.direction) {
        let resolved = resolve(&merges, cell);
        if !visited.insert(resolved.anchor) {
            continue;
        }
        let cells = resolved.cells();
        if cells.iter().any(|c| slots.get(c).is_some_and(|s| s.is_blocked)) {
            tracing::debug!("skipping blocked cell {}", resolved.anchor);
            continue;
        }

        let occupied: u32 = cells.iter().map(&used_at).sum();
        if occupied > 0 && !request.clear_occupied {
            tracing::debug!("cell {} occupied ({} items), skipped", resolved.anchor, occupied);
            collisions += 1;
            continue;
        }
        candidates.push(Candidate {
            anchor: resolved.anchor,
            cells,
            capacity: capacity_for(&cabinet, resolved.region.as_ref()),
            planned: Vec::new(),
            reclaim: occupied > 0,
        });
    }

    // Fill drawers already chosen by the plan before opening new ones.
    let mut plan = Vec::new();
    for item in &working {
        let target = candidates
            .iter()
            .position(|c| !c.planned.is_empty() && c.accepts(item))
            .or_else(|| candidates.iter().position(|c| c.accepts(item)));
        let Some(idx) = target else {
            tracing::debug!("no cell left for item {}; stopping", item.id);
            break;
        };
        candidates[idx].planned.push(item.clone());
        plan.push((item.id, candidates[idx].anchor));
    }

    // Occupied drawers the plan leaves alone are collisions too.
    if request.clear_occupied {
        collisions += candidates
            .iter()
            .filter(|c| c.reclaim && c.planned.is_empty())
            .count() as u32;
    }

    if plan.is_empty() {
        return Err(if collisions > 0 && !request.clear_occupied {
            PlacementError::RangeOccupied { collisions }
        } else {
            PlacementError::NoFreeCells
        });
    }

    let mut cleared_slots = 0u32;
    for candidate in candidates.iter().filter(|c| c.reclaim && !c.planned.is_empty()) {
        let drawer = Drawer::open_in(conn, cabinet.clone(), &merges, candidate.anchor)?;
        for slot in drawer.slots() {
            let displaced = tables::delete_slot_assignments(conn, slot.id)?;
            if displaced.is_empty() {
                continue;
            }
            tables::bump_version(conn, slot.id)?;
            for item_id in displaced {
                events.push(PlacementEvent::Cleared {
                    item_id,
                    position: drawer.position(),
                });
            }
        }
        tracing::debug!("reclaimed {} ({} cells)", candidate.anchor, candidate.cells.len());
        cleared_slots += 1;
    }

    let mut placements = Vec::with_capacity(plan.len());
    for (item_id, cell) in plan {
        let placed = assign_position(
            conn,
            item_id,
            cabinet.id,
            cell,
            AssignOptions::default(),
            events,
        )?;
        placements.push((item_id, placed.position.cell));
    }

    let remaining = tables::unplaced_items(conn, Some(request.category_id))?.len() as u32;
    let report = AutoAssignReport {
        assigned: placements.len() as u32,
        cleared_slots,
        collisions,
        requested,
        remaining,
        placements,
    };
    tracing::info!(
        "auto-assigned {}/{} items of category {} in {} ({} cleared, {} collisions, {} left)",
        report.assigned,
        report.requested,
        request.category_id,
        cabinet.name,
        report.cleared_slots,
        report.collisions,
        report.remaining
    );
    events.push(PlacementEvent::BulkAssigned {
        category_id: request.category_id,
        cabinet_id: cabinet.id,
        assigned: report.assigned,
        cleared_slots,
    });
    Ok(report)
}

fn compare_by(key: SortKey, a: &Item, b: &Item) -> Ordering {
    match key {
        SortKey::Measure => {
            compare_text(a.thread_size.as_deref(), b.thread_size.as_deref())
        }
        SortKey::Material => compare_text(a.material.as_deref(), b.material.as_deref()),
        SortKey::MainSize => match (a.main_size_mm, b.main_size_mm) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Name => natural_cmp(&a.name, &b.name),
        SortKey::Id => a.id.cmp(&b.id),
    }
}

/// Natural order; missing or blank values sort last.
fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.map(str::trim).filter(|s| !s.is_empty());
    let b = b.map(str::trim).filter(|s| !s.is_empty());
    match (a, b) {
        (Some(x), Some(y)) => natural_cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive natural order: digit runs compare as numbers, so
/// "M3" < "M10".
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek(), b_chars.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ac), Some(&bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let a_num = collect_number(&mut a_chars);
                    let b_num = collect_number(&mut b_chars);
                    match a_num.cmp(&b_num) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ac.to_lowercase().cmp(bc.to_lowercase()) {
                    Ordering::Equal => {
                        a_chars.next();
                        b_chars.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn collect_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> u64 {
    let mut num: u64 = 0;
    while let Some(&c) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                num = num.saturating_mul(10).saturating_add(u64::from(d));
                chars.next();
            }
            None => break,
        }
    }
    num
}

#[cfg(test)]
mod tests {
    use super::*;
    use binstock_api::{CabinetId, CategoryId, Direction, ItemId};
    use crate::placement::assign::create_merge;
    use crate::test_utils::Fixture;

    fn request(fx: &Fixture, start: CellRef, count: u32) -> AutoAssignRequest {
        AutoAssignRequest {
            category_id: fx.category,
            cabinet_id: fx.cabinet,
            start,
            direction: Direction::Horizontal,
            primary: SortKey::Measure,
            secondary: SortKey::Id,
            count,
            clear_occupied: false,
        }
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("M3", "M10"), Ordering::Less);
        assert_eq!(natural_cmp("m4", "M4"), Ordering::Equal);
        assert_eq!(natural_cmp("M2.5", "M2"), Ordering::Greater);
    }

    #[test]
    fn test_blank_measure_sorts_last() {
        assert_eq!(compare_text(None, Some("M3")), Ordering::Greater);
        assert_eq!(compare_text(Some(" "), Some("M3")), Ordering::Greater);
    }

    #[test]
    fn test_groups_by_measure_from_start() {
        let fx = Fixture::new();
        let m4 = fx.item("M4", true);
        let m3a = fx.item("M3", true);
        let m3b = fx.item("M3", true);

        let mut events = Vec::new();
        let report =
            auto_assign_category(fx.conn(), &request(&fx, fx.cell("B", 1), 10), &mut events).unwrap();

        assert_eq!(report.assigned, 3);
        assert_eq!(report.requested, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(
            report.placements,
            vec![(m3a, fx.cell("B", 1)), (m3b, fx.cell("B", 1)), (m4, fx.cell("C", 1))]
        );
    }

    #[test]
    fn test_occupied_range_without_clearing() {
        let fx = Fixture::with_compartments(1);
        fx.conn().execute("UPDATE cabinets SET rows_max = 1, cols_max = 'B'", []).unwrap();
        let mut events = Vec::new();
        for col in ["A", "B"] {
            let item = fx.item("M5", true);
            assign_position(fx.conn(), item, fx.cabinet, fx.cell(col, 1), AssignOptions::default(), &mut events)
                .unwrap();
        }
        fx.item("M3", true);

        let err = auto_assign_category(fx.conn(), &request(&fx, fx.cell("A", 1), 1), &mut events)
            .unwrap_err();
        assert!(matches!(err, PlacementError::RangeOccupied { collisions: 2 }));
    }

    #[test]
    fn test_clearing_reclaims_only_used_cells() {
        let fx = Fixture::with_compartments(1);
        fx.conn().execute("UPDATE cabinets SET rows_max = 1, cols_max = 'C'", []).unwrap();
        let mut events = Vec::new();
        let old: Vec<ItemId> = ["A", "B"]
            .iter()
            .map(|col| {
                let item = fx.item("M5", true);
                assign_position(fx.conn(), item, fx.cabinet, fx.cell(col, 1), AssignOptions::default(), &mut events)
                    .unwrap();
                item
            })
            .collect();
        let fresh = fx.item_in(fx.category("Nuts"), "M3", true);

        let req = AutoAssignRequest {
            category_id: CategoryId(2),
            cabinet_id: CabinetId(1),
            clear_occupied: true,
            ..request(&fx, fx.cell("A", 1), 1)
        };
        let report = auto_assign_category(fx.conn(), &req, &mut events).unwrap();
        assert_eq!(report.placements, vec![(fresh, fx.cell("A", 1))]);
        assert_eq!(report.cleared_slots, 1);
        assert_eq!(report.collisions, 1);
        assert!(tables::item_assignment(fx.conn(), old[0]).unwrap().is_none());
        assert!(tables::item_assignment(fx.conn(), old[1]).unwrap().is_some());
    }

    #[test]
    fn test_merged_region_visited_once() {
        let fx = Fixture::with_compartments(1);
        fx.conn().execute("UPDATE cabinets SET rows_max = 1, cols_max = 'C'", []).unwrap();
        let mut events = Vec::new();
        create_merge(fx.conn(), fx.cabinet, "A", "B", 1, 1, &mut events).unwrap();
        let items: Vec<_> = (0..3).map(|_| fx.item("M3", true)).collect();

        let report =
            auto_assign_category(fx.conn(), &request(&fx, fx.cell("A", 1), 3), &mut events).unwrap();
        assert_eq!(
            report.placements,
            vec![
                (items[0], fx.cell("A", 1)),
                (items[1], fx.cell("A", 1)),
                (items[2], fx.cell("C", 1)),
            ]
        );
        assert_eq!(report.collisions, 0);
    }

    #[test]
    fn test_vertical_walks_down_the_column() {
        let fx = Fixture::new();
        let m3 = fx.item("M3", true);
        let m4 = fx.item("M4", true);

        let req = AutoAssignRequest {
            direction: Direction::Vertical,
            ..request(&fx, fx.cell("A", 1), 2)
        };
        let mut events = Vec::new();
        let report = auto_assign_category(fx.conn(), &req, &mut events).unwrap();
        assert_eq!(report.placements, vec![(m3, fx.cell("A", 1)), (m4, fx.cell("A", 2))]);
    }

    #[test]
    fn test_nothing_to_place() {
        let fx = Fixture::new();
        let mut events = Vec::new();
        let err = auto_assign_category(fx.conn(), &request(&fx, fx.cell("A", 1), 3), &mut events)
            .unwrap_err();
        assert!(matches!(err, PlacementError::NothingToPlace { .. }));
    }
}
