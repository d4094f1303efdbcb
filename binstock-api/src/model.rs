//! Entity records shared between the engine and its collaborators.

use serde::{Deserialize, Serialize};

use crate::{CellRef, ColumnCode};

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_type! {
    /// Identifier of a storage location (a wall, a room).
    LocationId,
    /// Identifier of a cabinet.
    CabinetId,
    /// Identifier of a lazily created grid slot.
    SlotId,
    /// Identifier of a drawer merge.
    MergeId,
    /// Identifier of an assignment row.
    AssignmentId,
    /// Identifier of an item category.
    CategoryId,
    /// Identifier of an inventory item.
    ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
}

/// A named storage unit with a `rows_max` x `cols_max` grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cabinet {
    pub id: CabinetId,
    pub location_id: LocationId,
    pub name: String,
    pub rows_max: u32,
    pub cols_max: ColumnCode,
    /// Base capacity of a single, un-merged slot.
    pub compartments_per_slot: u32,
}

impl Cabinet {
    /// Whether `cell` lies inside this cabinet's grid.
    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row <= self.rows_max && cell.col <= self.cols_max
    }
}

/// Fields for creating or updating a cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCabinet {
    pub location_id: LocationId,
    pub name: String,
    pub rows_max: u32,
    pub cols_max: ColumnCode,
    pub compartments_per_slot: u32,
}

/// One grid cell that has been referenced at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub cabinet_id: CabinetId,
    pub cell: CellRef,
    pub is_blocked: bool,
    pub display_label: Option<String>,
    pub print_label: Option<String>,
    /// Bumped on every change to the slot's assignments or block flag.
    pub version: i64,
}

/// A rectangular region of cells, bounds inclusive and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeRegion {
    pub row_start: u32,
    pub row_end: u32,
    pub col_start: ColumnCode,
    pub col_end: ColumnCode,
}

impl MergeRegion {
    /// Build a region, swapping bounds so that start <= end.
    pub fn normalized(col_a: ColumnCode, col_b: ColumnCode, row_a: u32, row_b: u32) -> Self {
        Self {
            row_start: row_a.min(row_b),
            row_end: row_a.max(row_b),
            col_start: col_a.min(col_b),
            col_end: col_a.max(col_b),
        }
    }

    /// Top-left cell: minimum row, minimum column index.
    pub fn anchor(&self) -> CellRef {
        CellRef {
            col: self.col_start,
            row: self.row_start,
        }
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.row_start..=self.row_end).contains(&cell.row)
            && (self.col_start..=self.col_end).contains(&cell.col)
    }

    pub fn width(&self) -> u32 {
        u32::from(self.col_end.index() - self.col_start.index()) + 1
    }

    pub fn height(&self) -> u32 {
        self.row_end - self.row_start + 1
    }

    /// Number of cells covered.
    pub fn cell_count(&self) -> u32 {
        self.width() * self.height()
    }

    /// Both the row ranges and the column ranges intersect.
    pub fn overlaps(&self, other: &MergeRegion) -> bool {
        let rows = self.row_start <= other.row_end && other.row_start <= self.row_end;
        let cols = self.col_start <= other.col_end && other.col_start <= self.col_end;
        rows && cols
    }

    /// Every covered cell, row by row.
    pub fn cells(&self) -> Vec<CellRef> {
        let mut cells = Vec::with_capacity(self.cell_count() as usize);
        for row in self.row_start..=self.row_end {
            for idx in self.col_start.index()..=self.col_end.index() {
                if let Ok(col) = ColumnCode::from_index(idx) {
                    cells.push(CellRef { col, row });
                }
            }
        }
        cells
    }
}

/// A merged drawer: several cells acting as one larger slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawerMerge {
    pub id: MergeId,
    pub cabinet_id: CabinetId,
    pub region: MergeRegion,
}

/// "This item currently occupies this compartment of this slot."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub slot_id: SlotId,
    pub compartment_no: u32,
    pub item_id: ItemId,
}

/// An inventory item as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub category_id: CategoryId,
    pub name: String,
    /// Thread size / measure, e.g. "M3" or "1/4-20".
    pub thread_size: Option<String>,
    pub material: Option<String>,
    pub main_size_mm: Option<f64>,
    pub quantity: i64,
    /// Consent to share a compartment group with other compatible items.
    pub share_drawer: bool,
}

impl Item {
    /// Measure key used for sharing: trimmed and lower-cased, empty if unset.
    pub fn measure(&self) -> String {
        normalize_measure(self.thread_size.as_deref())
    }
}

pub fn normalize_measure(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

/// Fields for creating or updating an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub category_id: CategoryId,
    pub name: String,
    pub thread_size: Option<String>,
    pub material: Option<String>,
    pub main_size_mm: Option<f64>,
    pub quantity: i64,
    pub share_drawer: bool,
}

impl NewItem {
    pub fn new(category_id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            category_id,
            name: name.into(),
            thread_size: None,
            material: None,
            main_size_mm: None,
            quantity: 0,
            share_drawer: true,
        }
    }

    pub fn with_measure(mut self, measure: impl Into<String>) -> Self {
        self.thread_size = Some(measure.into());
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_main_size(mut self, mm: f64) -> Self {
        self.main_size_mm = Some(mm);
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.share_drawer = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(code: &str) -> ColumnCode {
        ColumnCode::new(code).unwrap()
    }

    #[test]
    fn test_region_normalized_and_anchor() {
        let region = MergeRegion::normalized(col("D"), col("B"), 5, 3);
        assert_eq!(region.row_start, 3);
        assert_eq!(region.row_end, 5);
        assert_eq!(region.anchor(), CellRef::parse("B", 3).unwrap());
        assert_eq!(region.cell_count(), 9);
    }

    #[test]
    fn test_region_columns_compare_by_index() {
        let region = MergeRegion::normalized(col("AA"), col("Z"), 1, 1);
        assert_eq!(region.col_start, col("Z"));
        assert_eq!(region.col_end, col("AA"));
        assert_eq!(region.cells().len(), 2);
    }

    #[test]
    fn test_region_overlap_needs_both_dimensions() {
        let a = MergeRegion::normalized(col("A"), col("B"), 1, 2);
        let rows_only = MergeRegion::normalized(col("C"), col("D"), 2, 3);
        let both = MergeRegion::normalized(col("B"), col("C"), 2, 3);
        assert!(!a.overlaps(&rows_only));
        assert!(a.overlaps(&both));
        assert!(both.overlaps(&a));
    }

    #[test]
    fn test_measure_normalization() {
        assert_eq!(normalize_measure(Some("  M3 ")), "m3");
        assert_eq!(normalize_measure(None), "");
    }
}
