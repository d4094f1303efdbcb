//! Placement events emitted by the kernel after each committed mutation.

use serde::{Deserialize, Serialize};

use crate::{CabinetId, CategoryId, CellRef, ItemId, MergeId, MergeRegion, Position};

/// Events emitted by the placement kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementEvent {
    /// An item now occupies a compartment of an anchor slot.
    Assigned {
        item_id: ItemId,
        position: Position,
        compartment_no: u32,
    },

    /// An item's placement was removed.
    Cleared { item_id: ItemId, position: Position },

    /// Items previously refusing to share were flipped to consenting.
    ShareConsentGranted { items: Vec<ItemId> },

    /// A drawer's contents moved (and, if `swapped`, the destination's came back).
    Moved {
        from: Position,
        to: Position,
        swapped: bool,
        items: usize,
    },

    /// Cells were blocked or unblocked.
    BlockChanged {
        cabinet_id: CabinetId,
        cells: Vec<CellRef>,
        blocked: bool,
    },

    /// A merged drawer was created.
    MergeCreated {
        merge_id: MergeId,
        cabinet_id: CabinetId,
        region: MergeRegion,
    },

    /// A merged drawer was dissolved.
    MergeDeleted {
        merge_id: MergeId,
        cabinet_id: CabinetId,
    },

    /// A bulk auto-assignment pass committed.
    BulkAssigned {
        category_id: CategoryId,
        cabinet_id: CabinetId,
        assigned: u32,
        cleared_slots: u32,
    },
}
