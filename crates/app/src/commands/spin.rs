//! Local spin on a fixed frame clock

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;

use bitevibes_core::{HistoryEntry, Result, SpinController, SpinEvent, SpinSnapshot};

use crate::network::NetworkManager;
use crate::render;
use crate::state::{pick_preset, AppState};

pub async fn run(
    state: &AppState,
    network: &NetworkManager,
    preset_id: Option<&str>,
    mute: bool,
) -> Result<()> {
    let meal = state.meal();
    let preset = pick_preset(state.menu().data(), preset_id, meal)?;

    let mut controller = SpinController::default();
    controller.set_items(preset.items.iter().cloned());
    controller.set_muted(state.muted(mute));
    let mut events = controller.subscribe();

    if !controller.spin(&mut rand::thread_rng()) {
        println!("\"{}\" has no enabled items to spin.", preset.name);
        return Ok(());
    }
    println!("Spinning \"{}\" ({} items)", preset.name, controller.items().len());

    let items = controller.items().to_vec();
    let frame = state.config.roulette.frame_interval();
    let cancelled = tokio::select! {
        _ = drive(&mut controller, frame, |snapshot| {
            render::frame(snapshot, &items);
            drain(&mut events);
        }) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    render::end_line();

    if cancelled {
        controller.reset();
        println!("Spin cancelled.");
        return Ok(());
    }

    for event in drain(&mut events) {
        if let SpinEvent::Result(item) = event {
            println!("\n  → {}\n", item.name);
            let entry = HistoryEntry::new(item.name, preset.name.clone(), meal);
            network.record_history(state, &entry).await;
            info!(preset = %preset.id, "Local spin recorded");
        }
    }
    Ok(())
}

/// Deliver frames on a fixed clock until the wheel stops asking for them
///
/// Returns the number of frames delivered.
pub async fn drive<F>(controller: &mut SpinController, frame: Duration, mut on_frame: F) -> u64
where
    F: FnMut(SpinSnapshot),
{
    let mut interval = tokio::time::interval(frame);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frames = 0;
    while controller.ticks().is_pending() {
        interval.tick().await;
        if controller.advance_frame() {
            frames += 1;
            on_frame(controller.snapshot());
        }
    }
    frames
}

/// Render queued events and hand back the ones the caller still needs
fn drain(events: &mut mpsc::UnboundedReceiver<SpinEvent>) -> Vec<SpinEvent> {
    let mut rest = Vec::new();
    while let Ok(event) = events.try_recv() {
        render::event(&event);
        if matches!(event, SpinEvent::Result(_)) {
            rest.push(event);
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitevibes_core::{Item, SpinStatus};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test(start_paused = true)]
    async fn test_drive_runs_to_rest() {
        let mut controller = SpinController::default();
        controller.set_items(vec![
            Item::with_id("a", "Ramen"),
            Item::with_id("b", "Soba"),
            Item::with_id("c", "Curry"),
        ]);
        let mut events = controller.subscribe();
        assert!(controller.spin(&mut StdRng::seed_from_u64(3)));

        let start = tokio::time::Instant::now();
        let frame = Duration::from_millis(16);
        let mut seen = 0;
        let frames = drive(&mut controller, frame, |_| seen += 1).await;

        assert_eq!(frames, seen);
        assert_eq!(frames, controller.ticks().scheduled_count());
        assert!(matches!(controller.status(), SpinStatus::Settled { .. }));
        assert!(start.elapsed() >= frame * (frames as u32 - 1));

        let results: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|e| matches!(e, SpinEvent::Result(_)))
            .collect();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_idle_wheel_returns_immediately() {
        let mut controller = SpinController::default();
        assert_eq!(drive(&mut controller, Duration::from_millis(16), |_| {}).await, 0);
    }
}
