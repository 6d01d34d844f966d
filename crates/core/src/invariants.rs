//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{HistoryEntry, RoomDocument, RoulettePhase};
use crate::physics::SpinState;

/// Validate one physics step inside a spin episode
pub fn assert_spin_invariants(previous: &SpinState, next: &SpinState) {
    debug_assert!(
        next.velocity <= previous.velocity,
        "velocity increased from {} to {}",
        previous.velocity,
        next.velocity
    );

    debug_assert!(
        next.velocity >= 0.0,
        "velocity went negative: {}",
        next.velocity
    );

    debug_assert!(
        (0.0..360.0).contains(&next.angle),
        "angle {} escaped [0, 360)",
        next.angle
    );
}

/// Check that a room document is internally consistent
///
/// Snapshots come from other devices, so this reports instead of panicking.
pub fn check_room(room: &RoomDocument) -> Result<()> {
    if !room.has_participant(room.host_id) {
        return Err(Error::InvalidInput(format!(
            "room {} host {} missing from participants",
            room.code, room.host_id
        )));
    }

    let unique: HashSet<_> = room.participants.iter().map(|p| p.id).collect();
    if unique.len() != room.participants.len() {
        return Err(Error::InvalidInput(format!(
            "room {} has duplicate participants",
            room.code
        )));
    }

    if room.roulette.is_spinning && room.roulette.result.is_some() {
        return Err(Error::InvalidInput(format!(
            "room {} is spinning but already has result {:?}",
            room.code, room.roulette.result
        )));
    }

    if room.roulette.phase() == RoulettePhase::Settled {
        let result = room.roulette.result.as_deref().unwrap_or_default();
        if !room.preset.items.iter().any(|i| i.name == result) {
            return Err(Error::InvalidInput(format!(
                "room {} settled on '{}' which is not in its list",
                room.code, result
            )));
        }
    }
    Ok(())
}

/// Assert that a locally built room document is consistent
pub fn assert_room_invariants(room: &RoomDocument) {
    if let Err(e) = check_room(room) {
        debug_assert!(false, "{}", e);
    }
}

/// Validate the local history cap
///
/// Order is insertion order, so timestamps are not required to be monotonic.
pub fn assert_history_invariants(entries: &[HistoryEntry], cap: usize) {
    debug_assert!(
        entries.len() <= cap,
        "history holds {} entries, cap is {}",
        entries.len(),
        cap
    );

    let unique: HashSet<_> = entries.iter().map(|e| e.id).collect();
    debug_assert!(
        unique.len() == entries.len(),
        "history holds duplicate entries"
    );
}
