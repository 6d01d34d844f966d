//! Exactly-once reactions to room snapshots
//!
//! Transports may deliver the same snapshot more than once, and an old
//! snapshot may arrive after a newer one. The observer keys every reaction
//! on the host's episode counter so each spin is announced at most once and
//! each result is revealed at most once.

use crate::models::RouletteState;

/// A roulette transition worth reacting to
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The host started spinning episode `episode`
    Started { episode: u64 },
    /// Episode `episode` settled on `result`
    Revealed {
        episode: u64,
        result: String,
        angle: f64,
    },
}

#[derive(Debug, Default, Clone)]
pub struct ResultObserver {
    started: Option<u64>,
    revealed: Option<u64>,
}

impl ResultObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one snapshot; returns the transition it causes, if any
    ///
    /// A result is only revealed for an episode this observer saw spinning,
    /// so joining a room that already shows a result stays quiet.
    pub fn observe(&mut self, state: &RouletteState) -> Option<Transition> {
        let episode = state.episode;

        if state.is_spinning {
            if is_newer(episode, self.started) && is_newer(episode, self.revealed) {
                self.started = Some(episode);
                return Some(Transition::Started { episode });
            }
            return None;
        }

        let result = state.result.as_ref()?;
        if self.started == Some(episode) && is_newer(episode, self.revealed) {
            self.revealed = Some(episode);
            return Some(Transition::Revealed {
                episode,
                result: result.clone(),
                angle: state.angle,
            });
        }
        None
    }

    /// Last episode whose result was revealed
    pub fn last_revealed(&self) -> Option<u64> {
        self.revealed
    }
}

fn is_newer(episode: u64, seen: Option<u64>) -> bool {
    seen.map_or(true, |seen| episode > seen)
}
