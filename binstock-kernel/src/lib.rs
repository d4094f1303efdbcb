//! Binstock Kernel - The slot/compartment allocation engine.
//!
//! This crate contains:
//! - Persistence (SQLite-backed cabinets, slots, merges, assignments)
//! - Grid geometry (merge regions, capacity, sweep paths)
//! - The placement engine (assign, clear, move, suggest, bulk walk)
//! - Read queries (slot contents, labels, grid view)
//! - A minimal catalog of locations, cabinets, categories and items

pub mod catalog;
pub mod config;
pub mod grid;
pub mod persistence;
pub mod placement;
pub mod queries;
pub mod roles;

mod error;
#[cfg(test)]
mod test_utils;

pub use config::{CabinetDefaults, KernelConfig};
pub use error::{ErrorKind, PlacementError, Result};
pub use persistence::Store;
pub use placement::assign::{AssignOptions, Placed};
pub use roles::CategoryRoles;

use binstock_api::{
    AutoAssignReport, AutoAssignRequest, Cabinet, CabinetId, Category, CategoryId, CellRef,
    DrawerMerge, GridView, Item, ItemId, Location, LocationId, MergeId, NewCabinet, NewItem,
    PlacementEvent, Position, ShareCheck, SlotContents,
};
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::persistence::tables;

/// The placement kernel - owns the store and publishes placement events.
pub struct Kernel {
    store: Store,
    roles: CategoryRoles,
    config: KernelConfig,
    event_tx: broadcast::Sender<PlacementEvent>,
}

impl Kernel {
    /// Open the database named by `config`, creating it on first use.
    pub fn open(config: KernelConfig) -> anyhow::Result<(Self, broadcast::Receiver<PlacementEvent>)> {
        let store = Store::open(&config.db_path)?;
        store.set_busy_timeout(config.busy_timeout())?;
        tracing::info!("opened placement store at {:?}", config.db_path);
        Ok(Self::with_store(store, config))
    }

    /// A kernel over a private in-memory database.
    pub fn open_in_memory(
        config: KernelConfig,
    ) -> anyhow::Result<(Self, broadcast::Receiver<PlacementEvent>)> {
        let store = Store::open_in_memory()?;
        Ok(Self::with_store(store, config))
    }

    fn with_store(store: Store, config: KernelConfig) -> (Self, broadcast::Receiver<PlacementEvent>) {
        let (event_tx, event_rx) = broadcast::channel(config.event_capacity.max(1));
        let kernel = Self {
            store,
            roles: CategoryRoles::new(config.category_roles.clone()),
            config,
            event_tx,
        };
        (kernel, event_rx)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn roles(&self) -> &CategoryRoles {
        &self.roles
    }

    /// Subscribe to placement events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlacementEvent> {
        self.event_tx.subscribe()
    }

    /// Run `op` in one write transaction, then publish what it produced.
    fn mutate<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection, &mut Vec<PlacementEvent>) -> Result<T>,
    {
        let mut events = Vec::new();
        let value = self.store.transact(|tx| op(tx, &mut events))?;
        for event in events {
            // No subscribers is fine
            let _ = self.event_tx.send(event);
        }
        Ok(value)
    }

    fn conn(&self) -> &Connection {
        self.store.conn()
    }

    // =====================================================================
    // Placement
    // =====================================================================

    /// Place an item into the drawer containing `(col, row)`.
    ///
    /// When other items do not consent to sharing the call fails with
    /// [`PlacementError::ShareRefused`]; `force_share` grants that consent
    /// and places the item in the same transaction.
    pub fn assign_position(
        &mut self,
        item_id: ItemId,
        cabinet_id: CabinetId,
        col: &str,
        row: u32,
        options: AssignOptions,
    ) -> Result<Placed> {
        let cell = CellRef::parse(col, row)?;
        self.mutate(|conn, events| {
            placement::assign::assign_position(conn, item_id, cabinet_id, cell, options, events)
        })
    }

    /// Dry run of the sharing rules for placing `item_id` at `(col, row)`.
    pub fn check_share(&self, item_id: ItemId, cabinet_id: CabinetId, col: &str, row: u32) -> Result<ShareCheck> {
        let cell = CellRef::parse(col, row)?;
        placement::suggest::check_share(self.conn(), item_id, cabinet_id, cell)
    }

    /// Record that these items agree to share their drawer.
    pub fn grant_share_consent(&mut self, items: &[ItemId]) -> Result<()> {
        self.mutate(|conn, events| {
            for id in items {
                tables::load_item(conn, *id)?;
            }
            tables::grant_share_consent(conn, items)?;
            tracing::info!("share consent granted for items {:?}", items);
            events.push(PlacementEvent::ShareConsentGranted {
                items: items.to_vec(),
            });
            Ok(())
        })
    }

    pub fn clear_position(&mut self, item_id: ItemId) -> Result<Option<Position>> {
        self.mutate(|conn, events| placement::assign::clear_position(conn, item_id, events))
    }

    /// Move (or swap) the content of one drawer into another.
    pub fn move_slot(
        &mut self,
        from: (CabinetId, &str, u32),
        to: (CabinetId, &str, u32),
        swap: bool,
    ) -> Result<usize> {
        let from = Position {
            cabinet_id: from.0,
            cell: CellRef::parse(from.1, from.2)?,
        };
        let to = Position {
            cabinet_id: to.0,
            cell: CellRef::parse(to.1, to.2)?,
        };
        self.mutate(|conn, events| placement::assign::move_slot(conn, from, to, swap, events))
    }

    pub fn suggest_position(&self, item_id: ItemId) -> Result<Option<Position>> {
        placement::suggest::suggest_position(self.conn(), item_id)
    }

    pub fn auto_assign_category(&mut self, request: &AutoAssignRequest) -> Result<AutoAssignReport> {
        self.mutate(|conn, events| placement::walker::auto_assign_category(conn, request, events))
    }

    pub fn block_cell(&mut self, cabinet_id: CabinetId, col: &str, row: u32) -> Result<Vec<CellRef>> {
        self.set_blocked(cabinet_id, col, row, true)
    }

    pub fn unblock_cell(&mut self, cabinet_id: CabinetId, col: &str, row: u32) -> Result<Vec<CellRef>> {
        self.set_blocked(cabinet_id, col, row, false)
    }

    fn set_blocked(&mut self, cabinet_id: CabinetId, col: &str, row: u32, blocked: bool) -> Result<Vec<CellRef>> {
        let cell = CellRef::parse(col, row)?;
        self.mutate(|conn, events| {
            placement::assign::set_blocked(conn, cabinet_id, cell, blocked, events)
        })
    }

    pub fn set_slot_labels(
        &mut self,
        cabinet_id: CabinetId,
        col: &str,
        row: u32,
        display: Option<&str>,
        print: Option<&str>,
    ) -> Result<()> {
        let cell = CellRef::parse(col, row)?;
        self.mutate(|conn, _| {
            placement::assign::set_slot_labels(conn, cabinet_id, cell, display, print)
        })
    }

    // =====================================================================
    // Merges
    // =====================================================================

    pub fn create_merge(
        &mut self,
        cabinet_id: CabinetId,
        col_start: &str,
        col_end: &str,
        row_start: u32,
        row_end: u32,
    ) -> Result<DrawerMerge> {
        self.mutate(|conn, events| {
            placement::assign::create_merge(conn, cabinet_id, col_start, col_end, row_start, row_end, events)
        })
    }

    pub fn delete_merge(&mut self, merge_id: MergeId) -> Result<()> {
        self.mutate(|conn, events| placement::assign::delete_merge(conn, merge_id, events))
    }

    /// Merges of a cabinet, ordered by anchor (row, then column).
    pub fn list_merges(&self, cabinet_id: CabinetId) -> Result<Vec<DrawerMerge>> {
        tables::load_cabinet(self.conn(), cabinet_id)?;
        let mut merges = tables::load_merges(self.conn(), cabinet_id)?;
        merges.sort_by_key(|m| (m.region.row_start, m.region.col_start));
        Ok(merges)
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn slot_contents(&self, cabinet_id: CabinetId, col: &str, row: u32) -> Result<SlotContents> {
        let cell = CellRef::parse(col, row)?;
        queries::slot_contents(self.conn(), cabinet_id, cell)
    }

    pub fn item_position(&self, item_id: ItemId) -> Result<Option<String>> {
        queries::item_position(self.conn(), item_id)
    }

    pub fn unplaced_items(&self, category: Option<CategoryId>) -> Result<Vec<Item>> {
        queries::unplaced_items(self.conn(), category)
    }

    pub fn cabinet_grid(&self, cabinet_id: CabinetId) -> Result<GridView> {
        queries::cabinet_grid(self.conn(), &self.roles, cabinet_id)
    }

    // =====================================================================
    // Catalog
    // =====================================================================

    pub fn add_location(&mut self, name: &str) -> Result<Location> {
        self.mutate(|conn, _| catalog::add_location(conn, name))
    }

    pub fn rename_location(&mut self, id: LocationId, name: &str) -> Result<Location> {
        self.mutate(|conn, _| catalog::rename_location(conn, id, name))
    }

    pub fn delete_location(&mut self, id: LocationId) -> Result<()> {
        self.mutate(|conn, _| catalog::delete_location(conn, id))
    }

    pub fn list_locations(&self) -> Result<Vec<Location>> {
        catalog::list_locations(self.conn())
    }

    /// Cabinet fields with the configured default geometry.
    pub fn new_cabinet(&self, location_id: LocationId, name: &str) -> NewCabinet {
        self.config.cabinet_defaults.for_location(location_id, name)
    }

    pub fn add_cabinet(&mut self, fields: &NewCabinet) -> Result<Cabinet> {
        self.mutate(|conn, _| catalog::add_cabinet(conn, fields))
    }

    pub fn update_cabinet(&mut self, id: CabinetId, fields: &NewCabinet) -> Result<Cabinet> {
        self.mutate(|conn, _| catalog::update_cabinet(conn, id, fields))
    }

    pub fn delete_cabinet(&mut self, id: CabinetId) -> Result<()> {
        self.mutate(|conn, _| catalog::delete_cabinet(conn, id))
    }

    pub fn list_cabinets(&self) -> Result<Vec<Cabinet>> {
        tables::list_cabinets(self.conn())
    }

    pub fn add_category(&mut self, name: &str, color: &str) -> Result<Category> {
        let category = self.mutate(|conn, _| catalog::add_category(conn, name, color))?;
        self.roles.invalidate();
        Ok(category)
    }

    pub fn delete_category(&mut self, id: CategoryId) -> Result<()> {
        self.mutate(|conn, _| catalog::delete_category(conn, id))?;
        self.roles.invalidate();
        Ok(())
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        tables::list_categories(self.conn())
    }

    pub fn add_item(&mut self, fields: &NewItem) -> Result<Item> {
        self.mutate(|conn, _| catalog::add_item(conn, fields))
    }

    pub fn update_item(&mut self, id: ItemId, fields: &NewItem) -> Result<Item> {
        self.mutate(|conn, _| catalog::update_item(conn, id, fields))
    }

    /// Delete an item; its placement, if any, is cleared first.
    pub fn delete_item(&mut self, id: ItemId) -> Result<()> {
        self.mutate(|conn, events| {
            placement::assign::clear_position(conn, id, events)?;
            catalog::delete_item(conn, id)
        })
    }

    pub fn get_item(&self, id: ItemId) -> Result<Item> {
        tables::load_item(self.conn(), id)
    }
}
