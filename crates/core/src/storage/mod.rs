//! SQLite storage layer for BiteVibes

mod history;
mod menus;
mod migrations;
mod parse;
mod settings;
mod traits;

use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;

use crate::error::Result;
use crate::menu::MenuData;
use crate::models::HistoryEntry;

pub use history::HistoryStore;
pub use menus::MenuStore;
pub use settings::SettingsStore;
pub use traits::{HistoryRepository, MenuRepository, Storage};

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "bitevibes.db";

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    pub fn menus(&self) -> MenuStore<'_> {
        MenuStore::new(&self.conn)
    }

    pub fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(&self.conn)
    }

    pub fn settings(&self) -> SettingsStore<'_> {
        SettingsStore::new(&self.conn)
    }
}

impl MenuRepository for Database {
    fn load_menu(&self) -> Result<Option<MenuData>> {
        self.menus().load()
    }

    fn save_menu(&self, data: &MenuData) -> Result<()> {
        self.menus().save(data)
    }
}

impl HistoryRepository for Database {
    fn append_history(&self, entry: &HistoryEntry, cap: usize) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let store = HistoryStore::new(&tx);
            store.insert(entry)?;
            store.prune(cap)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.history().list(limit)
    }
}
