//! Menu book: the user's presets and which one is active
//!
//! [`MenuData`] is the document that gets persisted locally and mirrored to
//! the cloud. [`MenuBook`] wraps it with a repository so every successful
//! edit is saved.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{validate_item_name, Item, MealType, Preset};
use crate::storage::MenuRepository;

/// Id of the first built-in preset
pub const DEFAULT_PRESET_ID: &str = "default";

fn preset(id: &str, name: &str, meal_type: MealType, items: &[(&str, &str)]) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        meal_type,
        items: items
            .iter()
            .map(|(id, name)| Item::with_id(*id, *name))
            .collect(),
    }
}

/// Built-in presets used on first run and when the last preset is deleted
pub fn default_presets() -> Vec<Preset> {
    vec![
        preset(
            DEFAULT_PRESET_ID,
            "Classic Menu",
            MealType::All,
            &[
                ("1", "Ramen"),
                ("2", "Curry Rice"),
                ("3", "Sushi"),
                ("4", "Hamburg Steak"),
                ("5", "Pasta"),
                ("6", "Yakiniku"),
                ("7", "Tempura"),
                ("8", "Udon"),
            ],
        ),
        preset(
            "lunch",
            "Weekday Lunch",
            MealType::Lunch,
            &[
                ("l1", "Gyudon"),
                ("l2", "Salad Bowl"),
                ("l3", "Sandwich"),
                ("l4", "Soba"),
                ("l5", "Onigiri Set"),
                ("l6", "Daily Set Meal"),
                ("l7", "Bagel"),
            ],
        ),
        preset(
            "weekend_lunch",
            "Weekend Lunch",
            MealType::Lunch,
            &[
                ("wl1", "Pancakes"),
                ("wl2", "Omurice"),
                ("wl3", "Bistro Lunch"),
                ("wl4", "Ethnic Food"),
                ("wl5", "Brunch Buffet"),
            ],
        ),
        preset(
            "dinner",
            "Classic Dinner",
            MealType::Dinner,
            &[
                ("d1", "Shabu-shabu"),
                ("d2", "Yakitori"),
                ("d3", "Italian"),
                ("d4", "Chinese"),
                ("d5", "Steak"),
                ("d6", "Hot Pot"),
            ],
        ),
        preset(
            "midnight",
            "Late-Night Cravings",
            MealType::Dinner,
            &[
                ("m1", "Jiro-style Ramen"),
                ("m2", "Pizza"),
                ("m3", "Karaage"),
                ("m4", "Cheeseburger"),
                ("m5", "Katsu Curry"),
                ("m6", "Fried Rice"),
            ],
        ),
    ]
}

/// Persisted menu document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuData {
    pub presets: Vec<Preset>,
    pub active_preset_id: String,
}

impl Default for MenuData {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            active_preset_id: DEFAULT_PRESET_ID.to_string(),
        }
    }
}

impl MenuData {
    pub fn preset(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    fn preset_mut(&mut self, id: &str) -> Result<&mut Preset> {
        self.presets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("preset {}", id)))
    }

    fn active_mut(&mut self) -> Result<&mut Preset> {
        let id = self.active_preset_id.clone();
        self.preset_mut(&id)
    }

    /// Presets offered under a meal filter
    pub fn filtered(&self, meal: MealType) -> Vec<&Preset> {
        self.presets
            .iter()
            .filter(|p| p.meal_type.matches(meal))
            .collect()
    }

    /// The active preset, else the first one matching `meal`, else the first
    pub fn active_preset(&self, meal: MealType) -> Option<&Preset> {
        self.preset(&self.active_preset_id)
            .or_else(|| self.filtered(meal).into_iter().next())
            .or_else(|| self.presets.first())
    }

    /// Re-select the first matching preset if the active one does not match
    ///
    /// Returns true if the active preset changed.
    pub fn align_with(&mut self, meal: MealType) -> bool {
        if self
            .preset(&self.active_preset_id)
            .is_some_and(|p| p.meal_type.matches(meal))
        {
            return false;
        }
        match self.filtered(meal).first().map(|p| p.id.clone()) {
            Some(id) => {
                debug!(preset = %id, meal = %meal, "Active preset aligned with meal type");
                self.active_preset_id = id;
                true
            }
            None => false,
        }
    }

    pub fn set_active(&mut self, id: &str) -> Result<()> {
        if self.preset(id).is_none() {
            return Err(Error::NotFound(format!("preset {}", id)));
        }
        self.active_preset_id = id.to_string();
        Ok(())
    }

    /// Add an empty preset and make it active
    pub fn add_preset(&mut self, name: &str, meal_type: MealType) -> Result<String> {
        let preset = Preset::new(validate_preset_name(name)?, meal_type);
        let id = preset.id.clone();
        self.presets.push(preset);
        self.active_preset_id = id.clone();
        Ok(id)
    }

    /// Remove a preset; removing the last one restores the defaults
    pub fn delete_preset(&mut self, id: &str) -> Result<()> {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        if self.presets.len() == before {
            return Err(Error::NotFound(format!("preset {}", id)));
        }

        match self.presets.first() {
            Some(first) => self.active_preset_id = first.id.clone(),
            None => {
                info!("Last preset deleted, restoring defaults");
                *self = Self::default();
            }
        }
        Ok(())
    }

    pub fn rename_preset(&mut self, id: &str, name: &str) -> Result<()> {
        let name = validate_preset_name(name)?;
        self.preset_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_meal_type(&mut self, id: &str, meal_type: MealType) -> Result<()> {
        self.preset_mut(id)?.meal_type = meal_type;
        Ok(())
    }

    /// Append an item to the active preset
    pub fn add_item(&mut self, name: &str) -> Result<String> {
        let item = Item::new(name)?;
        let id = item.id.clone();
        self.active_mut()?.items.push(item);
        Ok(id)
    }

    pub fn remove_item(&mut self, item_id: &str) -> Result<()> {
        let preset = self.active_mut()?;
        let before = preset.items.len();
        preset.items.retain(|i| i.id != item_id);
        if preset.items.len() == before {
            return Err(Error::NotFound(format!("item {}", item_id)));
        }
        Ok(())
    }

    pub fn rename_item(&mut self, item_id: &str, name: &str) -> Result<()> {
        let name = validate_item_name(name)?;
        self.active_item_mut(item_id)?.name = name;
        Ok(())
    }

    /// Flip an item's enabled flag; returns the new value
    pub fn toggle_item(&mut self, item_id: &str) -> Result<bool> {
        let item = self.active_item_mut(item_id)?;
        item.enabled = !item.enabled;
        Ok(item.enabled)
    }

    /// Add a preset received from elsewhere and make it active
    pub fn import_preset(&mut self, preset: Preset) -> String {
        let id = preset.id.clone();
        self.presets.push(preset);
        self.active_preset_id = id.clone();
        id
    }

    fn active_item_mut(&mut self, item_id: &str) -> Result<&mut Item> {
        self.active_mut()?
            .item_mut(item_id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item_id)))
    }
}

fn validate_preset_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("preset name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// A [`MenuData`] bound to local storage
///
/// Saving is best-effort: a failed write is logged and the edit still
/// applies in memory.
pub struct MenuBook<'a, R: MenuRepository> {
    repo: &'a R,
    data: MenuData,
}

impl<'a, R: MenuRepository> MenuBook<'a, R> {
    /// Load the saved menu, falling back to the defaults
    pub fn load(repo: &'a R) -> Self {
        let data = match repo.load_menu() {
            Ok(Some(data)) if !data.presets.is_empty() => data,
            Ok(_) => MenuData::default(),
            Err(e) => {
                warn!("Failed to load menu, using defaults: {}", e);
                MenuData::default()
            }
        };
        Self { repo, data }
    }

    pub fn data(&self) -> &MenuData {
        &self.data
    }

    /// Apply an edit and persist it if it succeeded
    pub fn update<T>(&mut self, edit: impl FnOnce(&mut MenuData) -> Result<T>) -> Result<T> {
        let value = edit(&mut self.data)?;
        self.save();
        Ok(value)
    }

    /// Replace everything, e.g. with a document loaded from the cloud
    pub fn replace(&mut self, data: MenuData) {
        self.data = data;
        self.save();
    }

    fn save(&self) {
        if let Err(e) = self.repo.save_menu(&self.data) {
            warn!("Failed to save menu: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_defaults() {
        let data = MenuData::default();
        assert_eq!(data.presets.len(), 5);
        assert_eq!(data.active_preset(MealType::Lunch).unwrap().id, "default");
    }

    #[test]
    fn test_filtered_keeps_all_tagged() {
        let data = MenuData::default();
        let lunch: Vec<_> = data
            .filtered(MealType::Lunch)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(lunch, vec!["default", "lunch", "weekend_lunch"]);
    }

    #[test]
    fn test_align_with_meal() {
        let mut data = MenuData::default();
        data.set_active("midnight").unwrap();

        assert!(data.align_with(MealType::Lunch));
        assert_eq!(data.active_preset_id, "default");
        assert!(!data.align_with(MealType::Lunch));
    }

    #[test]
    fn test_add_preset_becomes_active() {
        let mut data = MenuData::default();
        let id = data.add_preset("  Office  ", MealType::Lunch).unwrap();
        let active = data.active_preset(MealType::All).unwrap();
        assert_eq!(active.id, id);
        assert_eq!(active.name, "Office");
        assert!(data.add_preset("   ", MealType::All).is_err());
    }

    #[test]
    fn test_delete_last_preset_restores_defaults() {
        let mut data = MenuData {
            presets: vec![Preset::new("Only", MealType::All)],
            active_preset_id: String::new(),
        };
        let id = data.presets[0].id.clone();
        data.delete_preset(&id).unwrap();
        assert_eq!(data, MenuData::default());
    }

    #[test]
    fn test_delete_selects_first_remaining() {
        let mut data = MenuData::default();
        data.delete_preset("default").unwrap();
        assert_eq!(data.active_preset_id, "lunch");
        assert!(matches!(
            data.delete_preset("default"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_item_editing() {
        let mut data = MenuData::default();
        let id = data.add_item(" Gyoza ").unwrap();

        assert!(!data.toggle_item(&id).unwrap());
        data.rename_item(&id, "Dumplings").unwrap();
        let item = data.preset("default").unwrap().items.last().unwrap().clone();
        assert_eq!(item.name, "Dumplings");
        assert!(!item.enabled);

        data.remove_item(&id).unwrap();
        assert_eq!(data.preset("default").unwrap().items.len(), 8);
        assert!(data.remove_item(&id).is_err());
    }

    #[test]
    fn test_item_name_limits() {
        let mut data = MenuData::default();
        assert!(data.add_item("").is_err());
        assert!(data.add_item(&"x".repeat(31)).is_err());
        assert!(data.add_item(&"味".repeat(30)).is_ok());
    }

    #[test]
    fn test_legacy_document_without_meal_tags() {
        let json = r#"{
            "presets": [{"id": "p1", "name": "Old", "items": [{"id": "1", "name": "Soup", "enabled": true}]}],
            "activePresetId": "p1"
        }"#;
        let data: MenuData = serde_json::from_str(json).unwrap();
        assert_eq!(data.presets[0].meal_type, MealType::All);
    }

    #[test]
    fn test_book_persists_edits() {
        let db = Database::open_in_memory().unwrap();
        {
            let mut book = MenuBook::load(&db);
            book.update(|d| d.add_preset("Saved", MealType::Dinner))
                .unwrap();
        }

        let book = MenuBook::load(&db);
        assert_eq!(book.data().active_preset(MealType::All).unwrap().name, "Saved");
    }

    #[test]
    fn test_book_failed_edit_is_not_saved() {
        let db = Database::open_in_memory().unwrap();
        let mut book = MenuBook::load(&db);
        assert!(book.update(|d| d.set_active("missing")).is_err());
        assert!(db.load_menu().unwrap().is_none());
    }
}
