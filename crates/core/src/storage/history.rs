//! Selection history storage

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{format_datetime, parse_datetime, parse_meal, parse_uuid};
use crate::error::Result;
use crate::models::HistoryEntry;

pub struct HistoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, entry), fields(name = %entry.selected_name))]
    pub fn insert(&self, entry: &HistoryEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO history (id, selected_name, source_list_name, meal_context, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id.to_string(),
                entry.selected_name,
                entry.source_list_name,
                entry.meal_context.as_str(),
                format_datetime(&entry.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Keep only the `keep` most recently inserted rows; returns how many were removed
    #[instrument(skip(self))]
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM history WHERE id NOT IN (
                SELECT id FROM history ORDER BY rowid DESC LIMIT ?1
             )",
            params![keep as i64],
        )?;
        Ok(removed)
    }

    /// Most recently inserted first
    pub fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, selected_name, source_list_name, meal_context, timestamp
             FROM history ORDER BY rowid DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM history", [])?;
        Ok(())
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        selected_name: row.get(1)?,
        source_list_name: row.get(2)?,
        meal_context: parse_meal(3, &row.get::<_, String>(3)?)?,
        timestamp: parse_datetime(4, &row.get::<_, String>(4)?)?,
    })
}
