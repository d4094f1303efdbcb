//! Grid geometry: merge regions, capacity, and sweep paths.

pub mod capacity;
pub mod merge;
pub mod path;

pub use capacity::{capacity_for, max_compartments_for_slot, merged_cell_multiplier};
pub use merge::{
    find_overlap, merge_cells_from_region, merge_region_for, normalize_merge_bounds, resolve, Resolved,
};
pub use path::walk_path;
