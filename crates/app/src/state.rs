//! Application state management

use bitevibes_core::menu::MenuData;
use bitevibes_core::storage::DATABASE_FILE;
use bitevibes_core::{Config, Database, Error, MealType, MenuBook, Preset, Result};

/// Config plus the open local database
pub struct AppState {
    pub config: Config,
    pub db: Database,
}

impl AppState {
    pub fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        std::fs::create_dir_all(&data_dir)?;

        let db = Database::open(data_dir.join(DATABASE_FILE))?;
        tracing::debug!(path = %data_dir.display(), "Opened local database");

        Ok(Self { config, db })
    }

    pub fn menu(&self) -> MenuBook<'_, Database> {
        MenuBook::load(&self.db)
    }

    /// Meal context for this moment
    pub fn meal(&self) -> MealType {
        MealType::detect()
    }

    /// Mute from the flag or the stored preference
    pub fn muted(&self, flag: bool) -> bool {
        if flag || self.config.roulette.muted {
            return true;
        }
        match self.db.settings().muted() {
            Ok(muted) => muted,
            Err(e) => {
                tracing::warn!("Failed to read mute setting: {}", e);
                false
            }
        }
    }
}

/// The preset named by `id`, or the active one for the current meal
pub fn pick_preset(data: &MenuData, id: Option<&str>, meal: MealType) -> Result<Preset> {
    let preset = match id {
        Some(id) => data.preset(id),
        None => data.active_preset(meal),
    };
    preset
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("preset {}", id.unwrap_or("(active)"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitevibes_core::menu::DEFAULT_PRESET_ID;

    #[test]
    fn test_open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().join("nested")),
            ..Config::default()
        };

        let state = AppState::open(config).unwrap();
        assert!(dir.path().join("nested").join(DATABASE_FILE).exists());
        assert!(!state.menu().data().presets.is_empty());
    }

    #[test]
    fn test_pick_preset() {
        let data = MenuData::default();
        let preset = pick_preset(&data, Some(DEFAULT_PRESET_ID), MealType::Lunch).unwrap();
        assert_eq!(preset.id, DEFAULT_PRESET_ID);

        assert!(pick_preset(&data, None, MealType::Dinner).is_ok());
        assert!(matches!(
            pick_preset(&data, Some("missing"), MealType::All),
            Err(Error::NotFound(_))
        ));
    }
}
