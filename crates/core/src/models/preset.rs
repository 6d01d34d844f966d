//! Preset model - a named list of items

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Item, MealType};

/// A named, ordered collection of items with a meal tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    /// Documents written before meal tags existed load as `All`
    #[serde(default)]
    pub meal_type: MealType,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Preset {
    pub fn new(name: impl Into<String>, meal_type: MealType) -> Self {
        Self {
            id: format!("preset_{}", Uuid::new_v4().simple()),
            name: name.into(),
            meal_type,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    /// Items eligible for a spin, in list order
    pub fn enabled_items(&self) -> Vec<Item> {
        self.items.iter().filter(|i| i.enabled).cloned().collect()
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }
}
