//! Storage repository traits
//!
//! The menu book and history recorder depend on these rather than on
//! SQLite directly.

use crate::error::Result;
use crate::menu::MenuData;
use crate::models::HistoryEntry;

/// Menu document persistence
pub trait MenuRepository {
    /// Load the saved menu; `None` if nothing usable is stored
    fn load_menu(&self) -> Result<Option<MenuData>>;

    /// Overwrite the saved menu
    fn save_menu(&self, data: &MenuData) -> Result<()>;
}

/// Local selection history
pub trait HistoryRepository {
    /// Store an entry and drop everything beyond the newest `cap`
    fn append_history(&self, entry: &HistoryEntry, cap: usize) -> Result<()>;

    /// Newest entries first
    fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// Combined storage interface
pub trait Storage: MenuRepository + HistoryRepository {}

impl<T> Storage for T where T: MenuRepository + HistoryRepository {}
