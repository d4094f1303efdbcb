//! Bulk auto-assignment request and report.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CabinetId, CategoryId, CellRef, ItemId};

/// Sweep direction through the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Row-major: left to right, then the next row.
    #[default]
    #[serde(rename = "H")]
    Horizontal,
    /// Column-major: top to bottom, then the next column.
    #[serde(rename = "V")]
    Vertical,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "H" | "h" => Ok(Direction::Horizontal),
            "V" | "v" => Ok(Direction::Vertical),
            other => Err(format!("unknown direction {:?} (expected H or V)", other)),
        }
    }
}

/// Attribute used to order unplaced items before placing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Thread size, natural order ("M3" < "M10").
    Measure,
    /// Material name, case-insensitive.
    Material,
    /// Main size in millimetres, unset last.
    MainSize,
    /// Item name, case-insensitive natural order.
    Name,
    /// Identity (creation order).
    #[default]
    Id,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "measure" | "thread" => Ok(SortKey::Measure),
            "material" => Ok(SortKey::Material),
            "main_size" | "size" => Ok(SortKey::MainSize),
            "name" => Ok(SortKey::Name),
            "id" => Ok(SortKey::Id),
            other => Err(format!("unknown sort key {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAssignRequest {
    pub category_id: CategoryId,
    pub cabinet_id: CabinetId,
    pub start: CellRef,
    pub direction: Direction,
    pub primary: SortKey,
    pub secondary: SortKey,
    pub count: u32,
    /// Reclaim occupied cells on the path instead of skipping them.
    pub clear_occupied: bool,
}

/// Statistics of one bulk pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoAssignReport {
    pub assigned: u32,
    pub cleared_slots: u32,
    /// Occupied path cells that were skipped.
    pub collisions: u32,
    /// `min(count, unplaced items in the category)`.
    pub requested: u32,
    /// Unplaced items left in the category afterwards.
    pub remaining: u32,
    /// Placements in execution order (anchor cells).
    pub placements: Vec<(ItemId, CellRef)>,
}

impl AutoAssignReport {
    /// Fewer items were placed than requested.
    pub fn is_partial(&self) -> bool {
        self.assigned < self.requested
    }
}
