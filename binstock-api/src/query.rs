//! Read-side results returned by the engine's queries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{CabinetId, CategoryId, CellRef, ColumnCode, Item, ItemId, MergeRegion};

/// A cell address across cabinets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub cabinet_id: CabinetId,
    pub cell: CellRef,
}

/// Which label override applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelTarget {
    /// On-screen display.
    #[default]
    Display,
    /// Printed cards and labels.
    Print,
}

/// Outcome of a dry-run sharing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShareCheck {
    /// The item may join the current occupants as-is.
    Compatible,
    /// Measure/category rules forbid it; cannot be overridden.
    Incompatible { reason: IncompatibleReason },
    /// Compatible, but these items have not consented to sharing.
    /// Placing with `force_share` grants consent on their behalf.
    NeedsConsent { blockers: Vec<ItemId> },
}

impl ShareCheck {
    pub fn is_compatible(&self) -> bool {
        matches!(self, ShareCheck::Compatible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatibleReason {
    /// Occupants carry a different measure.
    MeasureMismatch,
    /// Same (empty) measure, but a different category.
    CategoryMismatch,
}

impl std::fmt::Display for IncompatibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncompatibleReason::MeasureMismatch => f.write_str("measure differs from current occupants"),
            IncompatibleReason::CategoryMismatch => {
                f.write_str("category differs and no shared measure")
            }
        }
    }
}

/// One occupied compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub compartment_no: u32,
    pub item: Item,
}

/// Everything stored in one (possibly merged) drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotContents {
    pub cabinet_id: CabinetId,
    /// The cell that was asked for.
    pub cell: CellRef,
    /// The cell that physically stores the assignments.
    pub anchor: CellRef,
    pub region: Option<MergeRegion>,
    /// `"{Cabinet}-{Label}"` for on-screen use.
    pub label: String,
    /// `"{Cabinet}-{Label}"` for printed output.
    pub print_label: String,
    pub blocked: bool,
    pub capacity: u32,
    /// Ordered by compartment number.
    pub entries: Vec<SlotEntry>,
}

impl SlotContents {
    pub fn redirected(&self) -> bool {
        self.cell != self.anchor
    }

    pub fn used(&self) -> u32 {
        self.entries.len() as u32
    }
}

/// A short caption for one item inside a grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridEntry {
    pub item_id: ItemId,
    pub text: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridCell {
    pub blocked: bool,
    pub entries: Vec<GridEntry>,
    /// Category of the first occupant.
    pub category_id: Option<CategoryId>,
    /// Set when the cell is the anchor of a merged drawer.
    pub region: Option<MergeRegion>,
}

/// Full-grid view of a cabinet for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridView {
    pub cabinet_id: CabinetId,
    pub cabinet_name: String,
    pub compartments_per_slot: u32,
    pub rows: Vec<u32>,
    pub cols: Vec<ColumnCode>,
    /// Non-trivial cells keyed `"{col}-{row}"`.
    pub cells: IndexMap<String, GridCell>,
}

impl GridView {
    pub fn cell_key(cell: CellRef) -> String {
        format!("{}-{}", cell.col, cell.row)
    }

    pub fn cell(&self, cell: CellRef) -> Option<&GridCell> {
        self.cells.get(&Self::cell_key(cell))
    }
}
