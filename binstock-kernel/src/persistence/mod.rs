//! SQLite-backed persistence for the placement engine.
//!
//! This module provides:
//! - The [`Store`], owning the connection and the schema
//! - Transaction scoping: every mutating operation runs in one
//!   `IMMEDIATE` transaction, committed on success and rolled back on error
//! - Row-level helpers in [`tables`], used inside those transactions

pub mod tables;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::PlacementError;

/// Database version for migrations.
const SCHEMA_VERSION: i32 = 1;

/// The persistence store backed by SQLite.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// How long a writer waits on a competing connection's lock.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Read-only access for queries outside a transaction.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one write transaction.
    ///
    /// `IMMEDIATE` takes the write lock before the first read, so the
    /// capacity and compatibility checks done inside `f` cannot race with
    /// another connection's placement.
    pub(crate) fn transact<T, F>(&mut self, f: F) -> Result<T, PlacementError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, PlacementError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Initialize the database schema.
    fn initialize(&mut self) -> Result<()> {
        let version = self.get_schema_version()?;

        if version == 0 {
            self.create_schema()?;
        } else if version > SCHEMA_VERSION {
            anyhow::bail!(
                "database schema version {} is newer than supported version {}",
                version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get::<_, i64>(0).map(|n| n > 0),
        )?;

        if !exists {
            return Ok(0);
        }

        let version: String = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
                row.get(0)
            })
            .context("meta table has no schema_version")?;

        version
            .parse()
            .with_context(|| format!("Malformed schema_version: {:?}", version))
    }

    /// Create the initial schema.
    fn create_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(r#"
            -- Metadata table for schema versioning
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                color TEXT NOT NULL DEFAULT '#000000'
            );

            CREATE TABLE IF NOT EXISTS cabinets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL,
                name TEXT NOT NULL UNIQUE,
                rows_max INTEGER NOT NULL DEFAULT 128,
                cols_max TEXT NOT NULL DEFAULT 'ZZ',
                compartments_per_slot INTEGER NOT NULL DEFAULT 6,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );

            -- Slots are created lazily, on first reference
            CREATE TABLE IF NOT EXISTS slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cabinet_id INTEGER NOT NULL,
                row_num INTEGER NOT NULL,
                col_code TEXT NOT NULL,
                is_blocked INTEGER NOT NULL DEFAULT 0,
                display_label TEXT,
                print_label TEXT,
                version INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (cabinet_id) REFERENCES cabinets(id),
                UNIQUE (cabinet_id, row_num, col_code)
            );

            CREATE TABLE IF NOT EXISTS drawer_merges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cabinet_id INTEGER NOT NULL,
                row_start INTEGER NOT NULL,
                row_end INTEGER NOT NULL,
                col_start TEXT NOT NULL,
                col_end TEXT NOT NULL,
                FOREIGN KEY (cabinet_id) REFERENCES cabinets(id)
            );

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                thread_size TEXT,
                material TEXT,
                main_size_mm REAL,
                quantity INTEGER NOT NULL DEFAULT 0,
                share_drawer INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY (category_id) REFERENCES categories(id)
            );

            -- One placement per item, one item per compartment
            CREATE TABLE IF NOT EXISTS assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slot_id INTEGER NOT NULL,
                compartment_no INTEGER NOT NULL,
                item_id INTEGER NOT NULL UNIQUE,
                assigned_at TEXT NOT NULL,
                FOREIGN KEY (slot_id) REFERENCES slots(id),
                FOREIGN KEY (item_id) REFERENCES items(id),
                UNIQUE (slot_id, compartment_no)
            );

            CREATE INDEX IF NOT EXISTS idx_slots_cabinet ON slots(cabinet_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_slot ON assignments(slot_id);
            CREATE INDEX IF NOT EXISTS idx_items_category ON items(category_id);

            -- Set schema version
            INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');
        "#)?;

        Ok(())
    }
}
