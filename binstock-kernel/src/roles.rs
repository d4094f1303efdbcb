//! Category roles: which category plays a named part ("washer", "screw").
//!
//! The mapping role -> category name is injected from configuration. Names
//! are resolved to ids on first use and cached until [`CategoryRoles::invalidate`].

use std::cell::RefCell;
use std::collections::HashMap;

use binstock_api::CategoryId;
use rusqlite::Connection;

use crate::error::Result;
use crate::persistence::tables;

pub const ROLE_WASHER: &str = "washer";
pub const ROLE_SCREW: &str = "screw";
pub const ROLE_STANDOFF: &str = "standoff";

pub struct CategoryRoles {
    /// role -> category name
    mapping: HashMap<String, String>,
    /// role -> category id, for roles whose category exists
    resolved: RefCell<Option<HashMap<String, CategoryId>>>,
}

impl CategoryRoles {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        let mapping = mapping
            .into_iter()
            .map(|(role, name)| (role.to_lowercase(), name.trim().to_lowercase()))
            .collect();
        Self {
            mapping,
            resolved: RefCell::new(None),
        }
    }

    /// The category id playing `role`, if configured and present.
    pub fn resolve(&self, conn: &Connection, role: &str) -> Result<Option<CategoryId>> {
        if self.resolved.borrow().is_none() {
            let table = self.load(conn)?;
            *self.resolved.borrow_mut() = Some(table);
        }
        Ok(self
            .resolved
            .borrow()
            .as_ref()
            .and_then(|table| table.get(&role.to_lowercase()).copied()))
    }

    /// Whether `category` plays `role`.
    pub fn has_role(&self, conn: &Connection, category: CategoryId, role: &str) -> Result<bool> {
        Ok(self.resolve(conn, role)? == Some(category))
    }

    /// Drop the cached ids; the next lookup reads the categories again.
    pub fn invalidate(&self) {
        self.resolved.borrow_mut().take();
    }

    fn load(&self, conn: &Connection) -> Result<HashMap<String, CategoryId>> {
        let by_name: HashMap<String, CategoryId> = tables::list_categories(conn)?
            .into_iter()
            .map(|c| (c.name.trim().to_lowercase(), c.id))
            .collect();

        let mut table = HashMap::new();
        for (role, name) in &self.mapping {
            match by_name.get(name) {
                Some(id) => {
                    table.insert(role.clone(), *id);
                }
                None => tracing::debug!("role {} maps to unknown category {:?}", role, name),
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Store;

    fn roles() -> CategoryRoles {
        CategoryRoles::new(HashMap::from([
            (ROLE_WASHER.to_string(), "Washers".to_string()),
            (ROLE_SCREW.to_string(), "Screws".to_string()),
        ]))
    }

    #[test]
    fn test_resolves_case_insensitively() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute("INSERT INTO categories (name) VALUES ('WASHERS')", [])
            .unwrap();

        let roles = roles();
        assert_eq!(roles.resolve(store.conn(), ROLE_WASHER).unwrap(), Some(CategoryId(1)));
        assert!(roles.has_role(store.conn(), CategoryId(1), "Washer").unwrap());
        assert_eq!(roles.resolve(store.conn(), ROLE_SCREW).unwrap(), None);
    }

    #[test]
    fn test_cache_needs_invalidate() {
        let store = Store::open_in_memory().unwrap();
        let roles = roles();
        assert_eq!(roles.resolve(store.conn(), ROLE_SCREW).unwrap(), None);

        store
            .conn()
            .execute("INSERT INTO categories (name) VALUES ('Screws')", [])
            .unwrap();
        assert_eq!(roles.resolve(store.conn(), ROLE_SCREW).unwrap(), None);

        roles.invalidate();
        assert_eq!(roles.resolve(store.conn(), ROLE_SCREW).unwrap(), Some(CategoryId(1)));
    }
}
