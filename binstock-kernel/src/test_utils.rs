//! Shared fixtures for unit tests.

use binstock_api::{CabinetId, CategoryId, CellRef, ItemId, Position};
use rusqlite::{params, Connection};

use crate::persistence::Store;

/// An in-memory store with one location, one 10 x F cabinet and one category.
pub struct Fixture {
    pub store: Store,
    pub cabinet: CabinetId,
    pub category: CategoryId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_compartments(6)
    }

    pub fn with_compartments(compartments: u32) -> Self {
        let store = Store::open_in_memory().unwrap();
        let conn = store.conn();
        conn.execute("INSERT INTO locations (name) VALUES ('Bench')", []).unwrap();
        conn.execute(
            "INSERT INTO cabinets (location_id, name, rows_max, cols_max, compartments_per_slot)
             VALUES (1, 'C1', 10, 'F', ?1)",
            params![compartments],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO categories (name, color) VALUES ('Screws', '#3366ff')",
            [],
        )
        .unwrap();
        Self {
            store,
            cabinet: CabinetId(1),
            category: CategoryId(1),
        }
    }

    pub fn conn(&self) -> &Connection {
        self.store.conn()
    }

    pub fn category(&self, name: &str) -> CategoryId {
        self.conn()
            .execute("INSERT INTO categories (name) VALUES (?1)", params![name])
            .unwrap();
        CategoryId(self.conn().last_insert_rowid())
    }

    pub fn item(&self, measure: &str, share: bool) -> ItemId {
        self.item_in(self.category, measure, share)
    }

    pub fn item_in(&self, category: CategoryId, measure: &str, share: bool) -> ItemId {
        let measure = (!measure.is_empty()).then_some(measure);
        self.conn()
            .execute(
                "INSERT INTO items (category_id, name, thread_size, share_drawer)
                 VALUES (?1, 'part', ?2, ?3)",
                params![category.0, measure, share],
            )
            .unwrap();
        ItemId(self.conn().last_insert_rowid())
    }

    pub fn cell(&self, col: &str, row: u32) -> CellRef {
        CellRef::parse(col, row).unwrap()
    }

    pub fn at(&self, col: &str, row: u32) -> Position {
        Position {
            cabinet_id: self.cabinet,
            cell: self.cell(col, row),
        }
    }
}
