//! Placement error types.

use binstock_api::{CabinetId, CategoryId, CellRef, CoordinateError, IncompatibleReason, ItemId, MergeId};
use thiserror::Error;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; rejected before any mutation.
    Validation,
    /// The current state forbids the operation.
    Conflict,
    /// A referenced record does not exist.
    NotFound,
    /// The database failed.
    Storage,
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("invalid coordinate: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error("cell {cell} of cabinet {cabinet_id} is blocked")]
    Blocked { cabinet_id: CabinetId, cell: CellRef },

    #[error("no free compartment at {cell}: {used} of {capacity} in use")]
    CapacityExceeded { cell: CellRef, capacity: u32, used: u32 },

    #[error("item {item_id} cannot share {cell}: {reason}")]
    Incompatible {
        item_id: ItemId,
        cell: CellRef,
        reason: IncompatibleReason,
    },

    #[error("items {blockers:?} do not allow sharing their drawer; retry with force_share")]
    ShareRefused { blockers: Vec<ItemId> },

    #[error("drawer categories differ: {categories:?}")]
    CategoryMismatch { categories: Vec<CategoryId> },

    #[error("nothing stored in {cell}")]
    SourceEmpty { cell: CellRef },

    #[error("cell {cell} is occupied ({count} items)")]
    Occupied { cell: CellRef, count: u32 },

    #[error("merge overlaps existing merge {existing}")]
    MergeOverlap { existing: MergeId },

    #[error("{0}")]
    InUse(String),

    #[error("no unplaced items in category {category_id}")]
    NothingToPlace { category_id: CategoryId },

    #[error("no free compatible cell on the path")]
    NoFreeCells,

    #[error("all {collisions} usable cells on the path are occupied; enable clearing to reclaim them")]
    RangeOccupied { collisions: u32 },

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl PlacementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlacementError::Coordinate(_) | PlacementError::Validation { .. } => {
                ErrorKind::Validation
            }
            PlacementError::NotFound { .. } => ErrorKind::NotFound,
            PlacementError::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Conflict,
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        PlacementError::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(what: &'static str, id: i64) -> Self {
        PlacementError::NotFound { what, id }
    }
}

pub type Result<T, E = PlacementError> = std::result::Result<T, E>;
