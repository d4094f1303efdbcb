//! Merge region resolution and validation.
//!
//! A merge turns a rectangle of cells into one drawer. Only its anchor (the
//! top-left cell) stores assignments; every operation addressed at another
//! covered cell is redirected there first.

use binstock_api::{Cabinet, CellRef, ColumnCode, DrawerMerge, MergeId, MergeRegion, MAX_ROWS};

use crate::error::{PlacementError, Result};

/// The region containing `cell`, if any.
pub fn merge_region_for(merges: &[DrawerMerge], cell: CellRef) -> Option<MergeRegion> {
    merges
        .iter()
        .map(|m| m.region)
        .find(|region| region.contains(cell))
}

/// Every `(col, row)` covered by `region`.
pub fn merge_cells_from_region(region: &MergeRegion) -> Vec<CellRef> {
    region.cells()
}

/// A cell after merge redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// The cell that was addressed.
    pub cell: CellRef,
    /// Where assignments live.
    pub anchor: CellRef,
    pub region: Option<MergeRegion>,
}

impl Resolved {
    pub fn redirected(&self) -> bool {
        self.cell != self.anchor
    }

    /// The anchor followed by every other covered cell.
    pub fn cells(&self) -> Vec<CellRef> {
        match &self.region {
            Some(region) => {
                let mut cells = vec![self.anchor];
                cells.extend(region.cells().into_iter().filter(|c| *c != self.anchor));
                cells
            }
            None => vec![self.anchor],
        }
    }
}

pub fn resolve(merges: &[DrawerMerge], cell: CellRef) -> Resolved {
    let region = merge_region_for(merges, cell);
    let anchor = region.map(|r| r.anchor()).unwrap_or(cell);
    if anchor != cell {
        tracing::debug!("cell {} redirected to merge anchor {}", cell, anchor);
    }
    Resolved { cell, anchor, region }
}

/// Validate and normalize the bounds of a new merge.
pub fn normalize_merge_bounds(
    cabinet: &Cabinet,
    col_start: &str,
    col_end: &str,
    row_start: u32,
    row_end: u32,
) -> Result<MergeRegion> {
    let start = ColumnCode::new(col_start)
        .map_err(|e| PlacementError::validation("col_start", e.to_string()))?;
    let end = ColumnCode::new(col_end)
        .map_err(|e| PlacementError::validation("col_end", e.to_string()))?;
    for (field, row) in [("row_start", row_start), ("row_end", row_end)] {
        if !(1..=MAX_ROWS).contains(&row) {
            return Err(PlacementError::validation(
                field,
                format!("row {} outside 1..={}", row, MAX_ROWS),
            ));
        }
    }

    let region = MergeRegion::normalized(start, end, row_start, row_end);
    if region.row_end > cabinet.rows_max {
        return Err(PlacementError::validation(
            "row_end",
            format!("row {} beyond cabinet rows ({})", region.row_end, cabinet.rows_max),
        ));
    }
    if region.col_end > cabinet.cols_max {
        return Err(PlacementError::validation(
            "col_end",
            format!("column {} beyond cabinet columns ({})", region.col_end, cabinet.cols_max),
        ));
    }
    if region.cell_count() < 2 {
        return Err(PlacementError::validation(
            "region",
            "a merge must span at least two cells",
        ));
    }
    Ok(region)
}

/// The first existing merge that overlaps `region`.
pub fn find_overlap(merges: &[DrawerMerge], region: &MergeRegion) -> Option<MergeId> {
    merges
        .iter()
        .find(|m| m.region.overlaps(region))
        .map(|m| m.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binstock_api::{CabinetId, LocationId};

    fn cabinet() -> Cabinet {
        Cabinet {
            id: CabinetId(1),
            location_id: LocationId(1),
            name: "C1".into(),
            rows_max: 10,
            cols_max: ColumnCode::new("H").unwrap(),
            compartments_per_slot: 6,
        }
    }

    fn cell(col: &str, row: u32) -> CellRef {
        CellRef::parse(col, row).unwrap()
    }

    fn merge(id: i64, region: MergeRegion) -> DrawerMerge {
        DrawerMerge {
            id: MergeId(id),
            cabinet_id: CabinetId(1),
            region,
        }
    }

    #[test]
    fn test_normalize_swaps_bounds() {
        let region = normalize_merge_bounds(&cabinet(), "D", "B", 4, 2).unwrap();
        assert_eq!(region.anchor(), cell("B", 2));
        assert_eq!(region.col_end.code(), "D");
        assert_eq!(region.row_end, 4);
    }

    #[test]
    fn test_normalize_rejects_single_cell() {
        let err = normalize_merge_bounds(&cabinet(), "C", "C", 3, 3).unwrap_err();
        assert!(matches!(err, PlacementError::Validation { field: "region", .. }));
    }

    #[test]
    fn test_normalize_names_offending_bound() {
        let c = cabinet();
        let bad_col = normalize_merge_bounds(&c, "a", "B", 1, 2).unwrap_err();
        assert!(matches!(bad_col, PlacementError::Validation { field: "col_start", .. }));

        let bad_row = normalize_merge_bounds(&c, "A", "B", 1, 129).unwrap_err();
        assert!(matches!(bad_row, PlacementError::Validation { field: "row_end", .. }));

        let past_rows = normalize_merge_bounds(&c, "A", "B", 9, 11).unwrap_err();
        assert!(matches!(past_rows, PlacementError::Validation { field: "row_end", .. }));

        let past_cols = normalize_merge_bounds(&c, "G", "I", 1, 1).unwrap_err();
        assert!(matches!(past_cols, PlacementError::Validation { field: "col_end", .. }));
    }

    #[test]
    fn test_resolve_redirects_to_anchor() {
        let merges = vec![merge(1, MergeRegion::normalized(
            ColumnCode::new("B").unwrap(),
            ColumnCode::new("D").unwrap(),
            2,
            3,
        ))];

        let inside = resolve(&merges, cell("C", 3));
        assert!(inside.redirected());
        assert_eq!(inside.anchor, cell("B", 2));
        let cells = inside.cells();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], cell("B", 2));

        let region = merge_region_for(&merges, cell("D", 2)).unwrap();
        assert_eq!(merge_cells_from_region(&region).len(), 6);

        let outside = resolve(&merges, cell("E", 3));
        assert!(!outside.redirected());
        assert_eq!(outside.cells(), vec![cell("E", 3)]);
    }

    #[test]
    fn test_find_overlap() {
        let col = |c: &str| ColumnCode::new(c).unwrap();
        let merges = vec![merge(7, MergeRegion::normalized(col("A"), col("B"), 1, 2))];
        let crossing = MergeRegion::normalized(col("B"), col("C"), 2, 3);
        let beside = MergeRegion::normalized(col("C"), col("D"), 1, 2);
        assert_eq!(find_overlap(&merges, &crossing), Some(MergeId(7)));
        assert_eq!(find_overlap(&merges, &beside), None);
    }
}
