//! Preset and item editing

use bitevibes_core::menu::MenuData;
use bitevibes_core::{MealType, Preset, Result};

use super::{ItemCommand, PresetCommand};
use crate::network::NetworkManager;
use crate::state::AppState;

pub async fn presets(
    state: &AppState,
    network: &mut NetworkManager,
    command: PresetCommand,
) -> Result<()> {
    let meal = state.meal();
    let mut book = state.menu();

    match command {
        PresetCommand::List { all } => {
            let data = book.data();
            let active = data.active_preset(meal).map(|p| p.id.clone());
            let filter = if all { MealType::All } else { meal };
            println!("Presets for {}:", filter);
            for preset in data.filtered(filter) {
                print_preset(preset, active.as_deref() == Some(preset.id.as_str()));
            }
            return Ok(());
        }
        PresetCommand::Add { name, meal } => {
            let id = book.update(|data| data.add_preset(&name, meal))?;
            println!("Added preset {}", id);
        }
        PresetCommand::Remove { id } => {
            book.update(|data| data.delete_preset(&id))?;
            println!("Removed preset {}", id);
        }
        PresetCommand::Rename { id, name } => {
            book.update(|data| data.rename_preset(&id, &name))?;
        }
        PresetCommand::Use { id } => {
            book.update(|data| data.set_active(&id))?;
            println!("Active preset is now {}", id);
        }
        PresetCommand::Meal { id, meal } => {
            book.update(|data| data.set_meal_type(&id, meal))?;
        }
    }

    push(network, book.data().clone()).await;
    Ok(())
}

pub async fn items(
    state: &AppState,
    network: &mut NetworkManager,
    command: ItemCommand,
) -> Result<()> {
    let meal = state.meal();
    let mut book = state.menu();
    // Item edits apply to the preset shown for this meal
    book.update(|data| {
        data.align_with(meal);
        Ok(())
    })?;

    match command {
        ItemCommand::List => {
            if let Some(preset) = book.data().active_preset(meal) {
                print_items(preset);
            }
            return Ok(());
        }
        ItemCommand::Add { name } => {
            let id = book.update(|data| data.add_item(&name))?;
            println!("Added item {}", id);
        }
        ItemCommand::Remove { id } => {
            book.update(|data| data.remove_item(&id))?;
        }
        ItemCommand::Rename { id, name } => {
            book.update(|data| data.rename_item(&id, &name))?;
        }
        ItemCommand::Toggle { id } => {
            let enabled = book.update(|data| data.toggle_item(&id))?;
            println!("{} is now {}", id, if enabled { "on" } else { "off" });
        }
    }

    push(network, book.data().clone()).await;
    Ok(())
}

/// Hand the edited menu to cloud sync
pub async fn push(network: &mut NetworkManager, data: MenuData) {
    network.schedule_save(data);
    network.flush_saves().await;
}

fn print_preset(preset: &Preset, active: bool) {
    let enabled = preset.items.iter().filter(|i| i.enabled).count();
    println!(
        "{} {:<24} [{}] {}/{} items  ({})",
        if active { "*" } else { " " },
        preset.name,
        preset.meal_type,
        enabled,
        preset.items.len(),
        preset.id
    );
}

fn print_items(preset: &Preset) {
    println!("{} [{}]", preset.name, preset.meal_type);
    for item in &preset.items {
        println!(
            "  [{}] {:<30} ({})",
            if item.enabled { "x" } else { " " },
            item.name,
            item.id
        );
    }
}
