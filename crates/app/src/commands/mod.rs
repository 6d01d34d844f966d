//! Subcommand implementations and their arguments

use clap::{Args, Subcommand};

use bitevibes_core::MealType;

pub mod history;
pub mod menu;
pub mod room;
pub mod serve;
pub mod share;
pub mod spin;

fn parse_meal(value: &str) -> Result<MealType, String> {
    value
        .parse()
        .map_err(|_| format!("expected all, lunch or dinner, got {value:?}"))
}

#[derive(Subcommand)]
pub enum PresetCommand {
    /// List presets for the current meal (or all of them)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Create an empty preset and make it active
    Add {
        name: String,
        #[arg(long, value_parser = parse_meal, default_value = "all")]
        meal: MealType,
    },
    /// Delete a preset
    Remove { id: String },
    Rename { id: String, name: String },
    /// Make a preset the active one
    Use { id: String },
    /// Tag a preset with a meal
    Meal {
        id: String,
        #[arg(value_parser = parse_meal)]
        meal: MealType,
    },
}

#[derive(Subcommand)]
pub enum ItemCommand {
    /// List items of the active preset
    List,
    Add { name: String },
    Remove { id: String },
    Rename { id: String, name: String },
    /// Enable or disable an item
    Toggle { id: String },
}

#[derive(Subcommand)]
pub enum ShareCommand {
    /// Print a share link for a preset
    Export {
        #[arg(long)]
        preset: Option<String>,
        #[arg(long, default_value = SHARE_BASE)]
        base: String,
    },
    /// Import a preset from a share link or bare token
    Import { link: String },
}

/// Link prefix for exported presets
pub const SHARE_BASE: &str = "https://bitevibes.app/";

#[derive(Args)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
    /// Read the cloud copy instead of the local one
    #[arg(long)]
    pub remote: bool,
}

#[derive(Subcommand)]
pub enum RoomCommand {
    /// Open a room and spin for everyone in it
    Host {
        #[arg(long)]
        preset: Option<String>,
    },
    /// Join a room by its six-letter code
    Join { code: String },
}
