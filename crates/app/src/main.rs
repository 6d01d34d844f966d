//! BiteVibes - food roulette
//!
//! Command-line front end: local spins on a frame clock, menu editing,
//! share links, history, live rooms and the hub server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bitevibes_core::{Config, Result};

mod commands;
mod network;
mod render;
mod state;

use commands::{HistoryArgs, ItemCommand, PresetCommand, RoomCommand, ShareCommand};

#[derive(Parser)]
#[command(name = "bitevibes", version, about = "Spin a wheel to decide what to eat")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "BITEVIBES_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the local database
    #[arg(long, env = "BITEVIBES_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Hub address, overriding the config file
    #[arg(long, env = "BITEVIBES_HUB", global = true)]
    hub: Option<String>,

    /// Work offline: skip the hub for cloud sync
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the room and cloud hub
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
    #[command(flatten)]
    Local(LocalCommand),
}

/// Commands that work on the local database
#[derive(Subcommand)]
enum LocalCommand {
    /// Spin the wheel locally
    Spin {
        /// Preset to spin instead of the active one
        #[arg(long)]
        preset: Option<String>,
        /// Silence clicks and fanfare
        #[arg(long)]
        mute: bool,
    },
    /// Manage presets
    Presets {
        #[command(subcommand)]
        command: PresetCommand,
    },
    /// Edit items of the active preset
    Items {
        #[command(subcommand)]
        command: ItemCommand,
    },
    /// Export or import share links
    Share {
        #[command(subcommand)]
        command: ShareCommand,
    },
    /// Show past results
    History(HistoryArgs),
    /// Spin together in a live room
    Room {
        #[command(subcommand)]
        command: RoomCommand,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    if let Err(e) = runtime.block_on(run(cli)) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(hub) = cli.hub {
        config.hub.addr = hub;
        config.hub.socket_addr()?;
    }
    if cli.offline {
        config.sync.enabled = false;
    }

    match cli.command {
        Commands::Serve { addr } => commands::serve::run(&config, addr).await,
        Commands::Local(command) => run_local(config, command).await,
    }
}

async fn run_local(config: Config, command: LocalCommand) -> Result<()> {
    let state = state::AppState::open(config)?;
    let mut network = network::NetworkManager::new();

    match command {
        LocalCommand::Spin { preset, mute } => {
            network.sync_on_start(&state).await;
            commands::spin::run(&state, &network, preset.as_deref(), mute).await
        }
        LocalCommand::Presets { command } => {
            network.sync_on_start(&state).await;
            commands::menu::presets(&state, &mut network, command).await
        }
        LocalCommand::Items { command } => {
            network.sync_on_start(&state).await;
            commands::menu::items(&state, &mut network, command).await
        }
        LocalCommand::Share { command } => {
            network.sync_on_start(&state).await;
            commands::share::run(&state, &mut network, command).await
        }
        LocalCommand::History(args) => {
            if args.remote {
                network.sync_on_start(&state).await;
            }
            commands::history::run(&state, &network, args).await
        }
        LocalCommand::Room { command } => {
            network.connect(&state).await?;
            commands::room::run(&state, &network, command).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match Config::default_path() {
            Some(path) => path,
            None => {
                tracing::debug!("No config directory, using defaults");
                return Ok(Config::default());
            }
        },
    };
    Ok(Config::load(&path)?)
}
