//! The allocation engine.
//!
//! Every function here runs against an open transaction. Mutating functions
//! push the `PlacementEvent`s they produce onto `events`; the caller
//! publishes them only once the transaction has committed.

pub mod assign;
pub mod compat;
pub mod suggest;
pub mod walker;

use binstock_api::{Assignment, Cabinet, CabinetId, CellRef, DrawerMerge, Position, Slot};
use rusqlite::Connection;

use crate::error::{PlacementError, Result};
use crate::grid::{capacity_for, resolve, Resolved};
use crate::persistence::tables;

pub use assign::AssignOptions;

/// Reject cells outside the cabinet's configured grid.
pub(crate) fn check_bounds(cabinet: &Cabinet, cell: CellRef) -> Result<()> {
    if !cabinet.contains(cell) {
        return Err(PlacementError::validation(
            "cell",
            format!(
                "{} lies outside cabinet {} ({} rows, columns A..{})",
                cell, cabinet.name, cabinet.rows_max, cabinet.cols_max
            ),
        ));
    }
    Ok(())
}

/// A drawer opened inside a transaction: the anchor slot and the slots of
/// every other cell its merge region covers, all created if missing.
pub(crate) struct Drawer {
    pub cabinet: Cabinet,
    pub resolved: Resolved,
    pub anchor: Slot,
    pub covered: Vec<Slot>,
    pub capacity: u32,
}

impl Drawer {
    pub fn open(conn: &Connection, cabinet_id: CabinetId, cell: CellRef) -> Result<Self> {
        let cabinet = tables::load_cabinet(conn, cabinet_id)?;
        check_bounds(&cabinet, cell)?;
        let merges = tables::load_merges(conn, cabinet_id)?;
        Self::open_in(conn, cabinet, &merges, cell)
    }

    /// Open with an already loaded cabinet and merge list.
    pub fn open_in(
        conn: &Connection,
        cabinet: Cabinet,
        merges: &[DrawerMerge],
        cell: CellRef,
    ) -> Result<Self> {
        let resolved = resolve(merges, cell);
        let anchor = tables::ensure_slot(conn, cabinet.id, resolved.anchor)?;
        let covered = resolved
            .cells()
            .into_iter()
            .skip(1)
            .map(|c| tables::ensure_slot(conn, cabinet.id, c))
            .collect::<Result<Vec<_>>>()?;
        let capacity = capacity_for(&cabinet, resolved.region.as_ref());
        Ok(Self {
            cabinet,
            resolved,
            anchor,
            covered,
            capacity,
        })
    }

    pub fn position(&self) -> Position {
        Position {
            cabinet_id: self.cabinet.id,
            cell: self.resolved.anchor,
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        std::iter::once(&self.anchor).chain(self.covered.iter())
    }

    pub fn any_blocked(&self) -> bool {
        self.slots().any(|s| s.is_blocked)
    }

    /// Assignments of the anchor, then any left on covered cells.
    pub fn assignments(&self, conn: &Connection) -> Result<Vec<Assignment>> {
        let mut all = Vec::new();
        for slot in self.slots() {
            all.extend(tables::slot_assignments(conn, slot.id)?);
        }
        Ok(all)
    }

    /// Move assignments found on covered cells onto the anchor.
    ///
    /// Returns how many were moved; the anchor still needs renumbering.
    pub fn consolidate(&self, conn: &Connection) -> Result<usize> {
        let mut moved = 0;
        for slot in &self.covered {
            let stray: Vec<_> = tables::slot_assignments(conn, slot.id)?
                .into_iter()
                .map(|a| a.id)
                .collect();
            if stray.is_empty() {
                continue;
            }
            tracing::debug!(
                "moving {} assignments from {} onto anchor {}",
                stray.len(),
                slot.cell,
                self.anchor.cell
            );
            tables::reparent(conn, &stray, self.anchor.id)?;
            tables::bump_version(conn, slot.id)?;
            moved += stray.len();
        }
        Ok(moved)
    }

    /// Re-read the anchor and confirm capacity and block state still hold.
    pub fn verify(&self, conn: &Connection) -> Result<()> {
        let anchor = tables::find_slot(conn, self.cabinet.id, self.resolved.anchor)?
            .ok_or_else(|| PlacementError::not_found("slot", self.anchor.id.0))?;
        let used = tables::slot_assignments(conn, anchor.id)?.len() as u32;
        if used > self.capacity {
            return Err(PlacementError::CapacityExceeded {
                cell: anchor.cell,
                capacity: self.capacity,
                used,
            });
        }
        if anchor.is_blocked && used > 0 {
            return Err(PlacementError::Blocked {
                cabinet_id: self.cabinet.id,
                cell: anchor.cell,
            });
        }
        Ok(())
    }
}
