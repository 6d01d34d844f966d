//! Menu document storage

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{instrument, warn};

use super::parse::{format_datetime, OptionalExt};
use crate::error::Result;
use crate::menu::MenuData;

pub struct MenuStore<'a> {
    conn: &'a Connection,
}

impl<'a> MenuStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load the menu document
    ///
    /// A row that no longer parses is treated as missing.
    pub fn load(&self) -> Result<Option<MenuData>> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT data FROM menu_document WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(json.and_then(|json| match serde_json::from_str(&json) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Ignoring unreadable menu document: {}", e);
                None
            }
        }))
    }

    #[instrument(skip(self, data), fields(presets = data.presets.len()))]
    pub fn save(&self, data: &MenuData) -> Result<()> {
        self.conn.execute(
            "INSERT INTO menu_document (id, data, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![serde_json::to_string(data)?, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::menu::MenuData;
    use crate::models::MealType;
    use crate::storage::Database;

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.menus().load().unwrap().is_none());

        let mut data = MenuData::default();
        data.add_preset("Mine", MealType::Lunch).unwrap();
        db.menus().save(&data).unwrap();
        db.menus().save(&data).unwrap();

        assert_eq!(db.menus().load().unwrap(), Some(data));
    }

    #[test]
    fn test_corrupt_document_loads_as_none() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO menu_document (id, data, updated_at) VALUES (1, '{oops', '')",
                [],
            )
            .unwrap();
        assert!(db.menus().load().unwrap().is_none());
    }
}
