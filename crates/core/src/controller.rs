//! Local spin controller
//!
//! Drives one wheel through `Idle -> Spinning -> Settled`, one physics step
//! per frame, and reports what happened to any number of subscribers.

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::invariants::assert_spin_invariants;
use crate::models::Item;
use crate::physics::{self, SpinState};
use crate::selection;
use crate::ticks::{FrameQueue, TickSource, TickToken};

/// Vibration pattern (ms on/off) when a spin starts
pub const START_PULSE: &[u32] = &[50];

/// Vibration pattern (ms on/off) when a spin settles
pub const SETTLE_PULSE: &[u32] = &[100, 30, 100, 30, 200];

/// Below this velocity the wheel stops clicking at segment edges
pub const CLICK_MIN_VELOCITY: f64 = 2.0;

/// Lifecycle of the current spin episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinStatus {
    Idle,
    Spinning,
    /// Terminal for the episode; `index` is into the enabled items
    Settled { index: usize },
}

impl SpinStatus {
    pub fn is_spinning(self) -> bool {
        matches!(self, SpinStatus::Spinning)
    }
}

/// Read-only view for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinSnapshot {
    pub angle: f64,
    pub status: SpinStatus,
}

/// Notifications emitted while a wheel spins
#[derive(Debug, Clone, PartialEq)]
pub enum SpinEvent {
    /// Vibration request
    Haptic(&'static [u32]),
    /// Audible click as a segment edge passes the pointer
    Click,
    /// Audible win jingle
    Fanfare,
    /// Visual celebration
    Celebrate,
    /// The episode settled on this item
    Result(Item),
}

/// State machine for a single on-device wheel
pub struct SpinController<T: TickSource = FrameQueue> {
    items: Vec<Item>,
    state: SpinState,
    status: SpinStatus,
    result: Option<Item>,
    pending: Option<TickToken>,
    ticks: T,
    muted: bool,
    listeners: Vec<mpsc::UnboundedSender<SpinEvent>>,
}

impl<T: TickSource> SpinController<T> {
    pub fn new(ticks: T) -> Self {
        Self {
            items: Vec::new(),
            state: SpinState::default(),
            status: SpinStatus::Idle,
            result: None,
            pending: None,
            ticks,
            muted: false,
            listeners: Vec::new(),
        }
    }

    /// Replace the wheel's items; disabled ones are dropped
    ///
    /// Allowed mid-spin. The item count at the moment of settling decides
    /// the result.
    pub fn set_items(&mut self, items: impl IntoIterator<Item = Item>) {
        self.items = items.into_iter().filter(|i| i.enabled).collect();
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Mute gates the audible events only
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn snapshot(&self) -> SpinSnapshot {
        SpinSnapshot {
            angle: self.state.angle,
            status: self.status,
        }
    }

    pub fn status(&self) -> SpinStatus {
        self.status
    }

    pub fn velocity(&self) -> f64 {
        self.state.velocity
    }

    /// The item the last settled episode landed on
    pub fn result(&self) -> Option<&Item> {
        self.result.as_ref()
    }

    pub fn ticks(&self) -> &T {
        &self.ticks
    }

    pub fn ticks_mut(&mut self) -> &mut T {
        &mut self.ticks
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SpinEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    /// Start a spin
    ///
    /// Returns false without touching any state if a spin is already
    /// running or there is nothing to spin.
    pub fn spin<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.status.is_spinning() {
            debug!("Spin rejected: already spinning");
            return false;
        }
        if self.items.is_empty() {
            debug!("Spin rejected: no enabled items");
            return false;
        }

        self.result = None;
        self.state.velocity = physics::initial_velocity(rng);
        self.status = SpinStatus::Spinning;
        info!(
            velocity = self.state.velocity,
            items = self.items.len(),
            "Spin started"
        );

        self.emit(SpinEvent::Haptic(START_PULSE));
        self.pending = Some(self.ticks.schedule());
        true
    }

    /// Handle one delivered frame
    ///
    /// Frames that were cancelled or superseded are ignored, so a late
    /// callback can never move the wheel after a reset.
    pub fn on_tick(&mut self, token: TickToken) {
        if self.pending != Some(token) {
            trace!(token = token.id(), "Ignoring stale frame");
            return;
        }
        self.pending = None;

        let previous = self.state;
        let next = physics::step(self.state);
        self.state = next.state;
        assert_spin_invariants(&previous, &self.state);

        if !self.muted
            && selection::crossed_segment(
                self.state.angle,
                self.state.velocity,
                self.items.len(),
                CLICK_MIN_VELOCITY,
            )
        {
            self.emit(SpinEvent::Click);
        }

        if next.stopped {
            self.settle();
        } else {
            self.pending = Some(self.ticks.schedule());
        }
    }

    /// Stop everything and return to a blank wheel. Valid from any state.
    pub fn reset(&mut self) {
        if let Some(token) = self.pending.take() {
            self.ticks.cancel(token);
        }
        self.state = SpinState::default();
        self.status = SpinStatus::Idle;
        self.result = None;
        debug!("Wheel reset");
    }

    fn settle(&mut self) {
        let selected = selection::select(self.state.angle, self.items.len())
            .and_then(|index| self.items.get(index).cloned().map(|item| (index, item)));

        match selected {
            Some((index, item)) => {
                info!(angle = self.state.angle, index, name = %item.name, "Spin settled");
                self.status = SpinStatus::Settled { index };
                self.result = Some(item.clone());
                if !self.muted {
                    self.emit(SpinEvent::Fanfare);
                }
                self.emit(SpinEvent::Haptic(SETTLE_PULSE));
                self.emit(SpinEvent::Celebrate);
                self.emit(SpinEvent::Result(item));
            }
            None => {
                debug!("Spin settled with no items left, returning to idle");
                self.status = SpinStatus::Idle;
            }
        }
    }

    fn emit(&mut self, event: SpinEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl SpinController<FrameQueue> {
    /// Deliver the outstanding frame, if there is one
    pub fn advance_frame(&mut self) -> bool {
        match self.ticks.fire() {
            Some(token) => {
                self.on_tick(token);
                true
            }
            None => false,
        }
    }
}

impl Default for SpinController<FrameQueue> {
    fn default() -> Self {
        Self::new(FrameQueue::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn items(names: &[&str]) -> Vec<Item> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Item::with_id(i.to_string(), *n))
            .collect()
    }

    fn wheel(names: &[&str]) -> SpinController {
        let mut controller: SpinController = SpinController::default();
        controller.set_items(items(names));
        controller
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SpinEvent>) -> Vec<SpinEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_spin_runs_to_settle() {
        let mut controller = wheel(&["A", "B", "C", "D"]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = controller.subscribe();

        assert!(controller.spin(&mut rng));
        assert_eq!(controller.status(), SpinStatus::Spinning);

        let bound = physics::max_steps_to_rest(physics::MAX_INITIAL_VELOCITY);
        let mut frames = 0;
        while controller.advance_frame() {
            frames += 1;
            assert!(frames <= bound);
        }

        let angle = controller.snapshot().angle;
        let expected = selection::select(angle, 4).unwrap();
        assert_eq!(controller.status(), SpinStatus::Settled { index: expected });
        assert_eq!(controller.result().unwrap().id, expected.to_string());
        assert!(!controller.ticks().is_pending());

        let events = drain(&mut events);
        assert_eq!(events.first(), Some(&SpinEvent::Haptic(START_PULSE)));
        let results: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SpinEvent::Result(_)))
            .collect();
        assert_eq!(results.len(), 1);
        assert!(events.contains(&SpinEvent::Celebrate));
        assert!(events.contains(&SpinEvent::Fanfare));
        assert!(events.contains(&SpinEvent::Click));
    }

    #[test]
    fn test_spin_ignored_while_spinning() {
        let mut controller = wheel(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(2);
        assert!(controller.spin(&mut rng));
        for _ in 0..10 {
            controller.advance_frame();
        }

        let before = (controller.snapshot(), controller.velocity());
        let scheduled = controller.ticks().scheduled_count();
        assert!(!controller.spin(&mut rng));
        assert_eq!((controller.snapshot(), controller.velocity()), before);
        assert_eq!(controller.ticks().scheduled_count(), scheduled);
    }

    #[test]
    fn test_spin_rejected_without_items() {
        let mut controller = wheel(&[]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(!controller.spin(&mut rng));
        assert_eq!(controller.status(), SpinStatus::Idle);
        assert!(!controller.ticks().is_pending());
    }

    #[test]
    fn test_disabled_items_never_land() {
        let mut controller: SpinController = SpinController::default();
        controller.set_items(vec![
            Item::with_id("a", "A").disabled(),
            Item::with_id("b", "B"),
        ]);
        assert_eq!(controller.items().len(), 1);

        let mut rng = StdRng::seed_from_u64(4);
        controller.spin(&mut rng);
        while controller.advance_frame() {}
        assert_eq!(controller.result().unwrap().id, "b");
    }

    #[test]
    fn test_reset_cancels_pending_frame() {
        let mut controller = wheel(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(5);
        controller.spin(&mut rng);
        controller.advance_frame();
        controller.advance_frame();

        // Grab the in-flight token before reset to simulate a late callback
        let late = controller.ticks_mut().fire().unwrap();
        controller.reset();

        assert_eq!(controller.status(), SpinStatus::Idle);
        assert_eq!(controller.snapshot().angle, 0.0);
        assert_eq!(controller.velocity(), 0.0);
        assert!(!controller.ticks().is_pending());

        controller.on_tick(late);
        assert_eq!(controller.snapshot().angle, 0.0);
        assert_eq!(controller.status(), SpinStatus::Idle);
        assert!(!controller.advance_frame());
    }

    #[test]
    fn test_reset_from_spinning_counts_cancellation() {
        let mut controller = wheel(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(6);
        controller.spin(&mut rng);
        controller.advance_frame();
        controller.reset();
        assert_eq!(controller.ticks().cancelled_count(), 1);
    }

    #[test]
    fn test_items_removed_mid_spin_returns_to_idle() {
        let mut controller = wheel(&["A", "B"]);
        let mut events = controller.subscribe();
        let mut rng = StdRng::seed_from_u64(7);
        controller.spin(&mut rng);
        controller.advance_frame();
        controller.set_items(Vec::new());
        while controller.advance_frame() {}

        assert_eq!(controller.status(), SpinStatus::Idle);
        assert!(controller.result().is_none());
        assert!(!drain(&mut events)
            .iter()
            .any(|e| matches!(e, SpinEvent::Result(_))));
    }

    #[test]
    fn test_mute_silences_audio_only() {
        let mut controller = wheel(&["A", "B", "C", "D", "E", "F"]);
        controller.set_muted(true);
        let mut events = controller.subscribe();
        let mut rng = StdRng::seed_from_u64(8);
        controller.spin(&mut rng);
        while controller.advance_frame() {}

        let events = drain(&mut events);
        assert!(!events.contains(&SpinEvent::Click));
        assert!(!events.contains(&SpinEvent::Fanfare));
        assert!(events.contains(&SpinEvent::Haptic(SETTLE_PULSE)));
        assert!(events.iter().any(|e| matches!(e, SpinEvent::Result(_))));
    }

    #[test]
    fn test_new_spin_after_settle() {
        let mut controller = wheel(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(9);
        controller.spin(&mut rng);
        while controller.advance_frame() {}
        assert!(matches!(controller.status(), SpinStatus::Settled { .. }));

        assert!(controller.spin(&mut rng));
        assert_eq!(controller.status(), SpinStatus::Spinning);
        assert!(controller.result().is_none());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut controller = wheel(&["A", "B"]);
        let rx = controller.subscribe();
        drop(rx);
        let mut rng = StdRng::seed_from_u64(10);
        controller.spin(&mut rng);
        assert!(controller.listeners.is_empty());
    }
}
