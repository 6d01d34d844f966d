//! Key/value settings
//!
//! Holds the anonymous cloud identity and the mute flag.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse::{format_datetime, OptionalExt};
use crate::error::Result;

const USER_ID_KEY: &str = "user_id";
const MUTED_KEY: &str = "muted";

pub struct SettingsStore<'a> {
    conn: &'a Connection,
}

impl<'a> SettingsStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    /// Anonymous cloud identity, if one was issued before
    pub fn user_id(&self) -> Result<Option<Uuid>> {
        // A mangled id is as good as none; a fresh sign-in replaces it
        Ok(self
            .get(USER_ID_KEY)?
            .and_then(|s| Uuid::parse_str(&s).ok()))
    }

    pub fn set_user_id(&self, user_id: Uuid) -> Result<()> {
        self.set(USER_ID_KEY, &user_id.to_string())
    }

    pub fn muted(&self) -> Result<bool> {
        Ok(self.get(MUTED_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.set(MUTED_KEY, if muted { "true" } else { "false" })
    }
}
