//! Menu item model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum length of an item name, in characters
pub const MAX_ITEM_NAME_CHARS: usize = 30;

/// A single option on the wheel
///
/// Identity is the `id`; disabled items stay in their list but never land
/// on the wheel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

impl Item {
    /// Create an enabled item, validating the name
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            id: format!("item_{}", Uuid::new_v4().simple()),
            name: validate_item_name(name)?,
            enabled: true,
        })
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Trim and check an item name against the 1..=30 character rule
pub fn validate_item_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(Error::InvalidInput("item name must not be empty".into()));
    }
    if len > MAX_ITEM_NAME_CHARS {
        return Err(Error::InvalidInput(format!(
            "item name is {} characters (max {})",
            len, MAX_ITEM_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}
