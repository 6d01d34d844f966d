//! Live room session
//!
//! The host's wheel outcome comes from the room; the local wheel only
//! animates while the room says it is spinning and is snapped away when the
//! result is revealed.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use bitevibes_core::{
    Error, HistoryEntry, Result, RoomCode, RoomEvent, RoomSynchronizer, RoomTransport,
    SpinController,
};

use super::RoomCommand;
use crate::network::NetworkManager;
use crate::render;
use crate::state::{pick_preset, AppState};

pub async fn run(state: &AppState, network: &NetworkManager, command: RoomCommand) -> Result<()> {
    let client = network
        .client()
        .cloned()
        .ok_or_else(|| Error::Transport("not connected to a hub".into()))?;
    let mut sync = RoomSynchronizer::new(client, network.participant())
        .with_reveal_delay(state.config.room.reveal_delay());

    match command {
        RoomCommand::Host { preset } => {
            let preset = pick_preset(state.menu().data(), preset.as_deref(), state.meal())?;
            let code = sync.create_room(&mut rand::thread_rng(), preset).await?;
            println!("Room {} is open. Share the code; type `spin` to spin, `leave` to close.", code);
        }
        RoomCommand::Join { code } => {
            let code = RoomCode::parse(&code)?;
            let room = sync.join_room(&code).await?;
            println!(
                "Joined room {} spinning \"{}\" with {} others. Type `leave` to exit.",
                code,
                room.preset.name,
                room.participants.len().saturating_sub(1)
            );
        }
    }

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let input = BufReader::new(tokio::io::stdin());
    session(state, network, &mut sync, input, interrupted).await
}

/// Drive one room until it closes, the user leaves, or `quit` resolves
async fn session<T, R, Q>(
    state: &AppState,
    network: &NetworkManager,
    sync: &mut RoomSynchronizer<T>,
    input: R,
    quit: Q,
) -> Result<()>
where
    T: RoomTransport,
    R: AsyncBufRead + Unpin,
    Q: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(quit);
    let mut wheel = SpinController::default();
    wheel.set_muted(state.muted(false));
    let mut frames = tokio::time::interval(state.config.roulette.frame_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = sync.next_event() => {
                let Some(mut event) = event else { break };
                if event == RoomEvent::RevealDue {
                    // Branch bodies are not raced, so the publish runs to completion
                    event = sync.publish_reveal().await.unwrap_or(RoomEvent::Updated);
                }
                if !on_event(state, network, sync, &mut wheel, event).await {
                    break;
                }
            }
            line = lines.next_line() => {
                let command = line?;
                let Some(command) = command else {
                    sync.leave().await?;
                    break;
                };
                if !on_command(sync, command.trim()).await? {
                    break;
                }
            }
            _ = frames.tick(), if wheel.ticks().is_pending() => {
                if wheel.advance_frame() {
                    render::frame(wheel.snapshot(), wheel.items());
                }
            }
            _ = &mut quit => {
                wheel.reset();
                render::end_line();
                sync.leave().await?;
                println!("Left the room.");
                break;
            }
        }
    }
    Ok(())
}

/// React to a room event; false ends the session
async fn on_event<T: RoomTransport>(
    state: &AppState,
    network: &NetworkManager,
    sync: &RoomSynchronizer<T>,
    wheel: &mut SpinController,
    event: RoomEvent,
) -> bool {
    match event {
        RoomEvent::RevealDue => {}
        RoomEvent::Updated => {
            if let Some(room) = sync.room() {
                debug!(participants = room.participants.len(), "Room updated");
            }
        }
        RoomEvent::SpinStarted { episode } => {
            if let Some(room) = sync.room() {
                wheel.reset();
                wheel.set_items(room.preset.items.iter().cloned());
                wheel.spin(&mut rand::thread_rng());
            }
            println!("\nSpin #{} started...", episode);
        }
        RoomEvent::ResultRevealed {
            episode,
            result,
            angle,
        } => {
            wheel.reset();
            render::end_line();
            println!("  → {}  (stopped at {:.1}°)\n", result, angle);

            let list = sync
                .room()
                .map(|room| room.preset.name.clone())
                .unwrap_or_default();
            let entry = HistoryEntry::new(result, list, state.meal());
            network.record_history(state, &entry).await;
            info!(episode, "Room result recorded");
        }
        RoomEvent::TransportFailed(reason) => {
            println!("Could not publish the result ({}). Try `spin` again.", reason);
        }
        RoomEvent::Closed => {
            wheel.reset();
            println!("The room was closed.");
            return false;
        }
    }
    true
}

/// Handle one stdin line; false ends the session
async fn on_command<T: RoomTransport>(sync: &mut RoomSynchronizer<T>, command: &str) -> Result<bool> {
    match command {
        "spin" => {
            if !sync.request_spin(&mut rand::thread_rng()).await? {
                if sync.is_host() {
                    println!("Wait for the current result first.");
                } else {
                    println!("Only the host can spin.");
                }
            }
        }
        "leave" | "quit" | "exit" => {
            sync.leave().await?;
            println!("Left the room.");
            return Ok(false);
        }
        "" => {}
        other => println!("Unknown command {:?}; use `spin` or `leave`.", other),
    }
    Ok(true)
}
