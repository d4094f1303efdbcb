//! Effective compartment capacity of a (possibly merged) cell.

use binstock_api::{Cabinet, CellRef, DrawerMerge, MergeRegion};

use super::merge::merge_region_for;

/// Cell count of the merge covering a cell, or 1.
pub fn merged_cell_multiplier(region: Option<&MergeRegion>) -> u32 {
    region.map(MergeRegion::cell_count).unwrap_or(1)
}

/// Capacity of a drawer given the region it belongs to.
pub fn capacity_for(cabinet: &Cabinet, region: Option<&MergeRegion>) -> u32 {
    cabinet.compartments_per_slot.max(1) * merged_cell_multiplier(region).max(1)
}

/// Maximum number of items the drawer containing `cell` can hold.
///
/// Every cell of a merged region reports the same value.
pub fn max_compartments_for_slot(cabinet: &Cabinet, merges: &[DrawerMerge], cell: CellRef) -> u32 {
    let region = merge_region_for(merges, cell);
    capacity_for(cabinet, region.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binstock_api::{CabinetId, ColumnCode, LocationId, MergeId};

    fn cabinet(base: u32) -> Cabinet {
        Cabinet {
            id: CabinetId(1),
            location_id: LocationId(1),
            name: "C1".into(),
            rows_max: 10,
            cols_max: ColumnCode::new("H").unwrap(),
            compartments_per_slot: base,
        }
    }

    #[test]
    fn test_merged_capacity_same_for_every_cell() {
        let region = MergeRegion::normalized(
            ColumnCode::new("B").unwrap(),
            ColumnCode::new("D").unwrap(),
            2,
            3,
        );
        let merges = vec![DrawerMerge {
            id: MergeId(1),
            cabinet_id: CabinetId(1),
            region,
        }];
        let cab = cabinet(6);
        for cell in region.cells() {
            assert_eq!(max_compartments_for_slot(&cab, &merges, cell), 36);
        }
        let outside = CellRef::parse("A", 1).unwrap();
        assert_eq!(max_compartments_for_slot(&cab, &merges, outside), 6);
    }

    #[test]
    fn test_zero_base_counts_as_one() {
        let cab = cabinet(0);
        assert_eq!(capacity_for(&cab, None), 1);
    }
}
