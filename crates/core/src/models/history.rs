//! History entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MealType;

/// One past selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub selected_name: String,
    pub source_list_name: String,
    pub meal_context: MealType,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        selected_name: impl Into<String>,
        source_list_name: impl Into<String>,
        meal_context: MealType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            selected_name: selected_name.into(),
            source_list_name: source_list_name.into(),
            meal_context,
            timestamp: Utc::now(),
        }
    }

    pub fn format_timestamp(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}
