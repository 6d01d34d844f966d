//! Shared room document model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Preset;
use crate::error::Error;

/// Room codes are exactly this many characters
pub const ROOM_CODE_LEN: usize = 6;

/// Upper-case letters and digits without the look-alikes 0/O and 1/I
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Six-character room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draw a fresh random code
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input; surrounding whitespace and case are ignored
    pub fn parse(value: &str) -> Result<Self, Error> {
        let normalized = value.trim().to_ascii_uppercase();
        let len = normalized.chars().count();
        if len != ROOM_CODE_LEN {
            return Err(Error::InvalidInput(format!(
                "room code must be {} characters, got {}",
                ROOM_CODE_LEN, len
            )));
        }
        if let Some((index, ch)) = normalized
            .chars()
            .enumerate()
            .find(|(_, ch)| !ROOM_CODE_ALPHABET.contains(*ch))
        {
            return Err(Error::InvalidInput(format!(
                "invalid character '{}' at position {} in room code",
                ch, index
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// A member of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// Lifecycle phase derived from a [`RouletteState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoulettePhase {
    Idle,
    Spinning,
    Settled,
}

/// The mutable part of a room, written by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouletteState {
    pub is_spinning: bool,
    pub angle: f64,
    pub result: Option<String>,
    /// Incremented by the host for every spin it starts
    #[serde(default)]
    pub episode: u64,
}

impl RouletteState {
    pub fn idle() -> Self {
        Self {
            is_spinning: false,
            angle: 0.0,
            result: None,
            episode: 0,
        }
    }

    pub fn spinning(episode: u64, angle: f64) -> Self {
        Self {
            is_spinning: true,
            angle,
            result: None,
            episode,
        }
    }

    pub fn settled(episode: u64, result: impl Into<String>, angle: f64) -> Self {
        Self {
            is_spinning: false,
            angle,
            result: Some(result.into()),
            episode,
        }
    }

    pub fn phase(&self) -> RoulettePhase {
        match (self.is_spinning, &self.result) {
            (true, _) => RoulettePhase::Spinning,
            (false, Some(_)) => RoulettePhase::Settled,
            (false, None) => RoulettePhase::Idle,
        }
    }
}

impl Default for RouletteState {
    fn default() -> Self {
        Self::idle()
    }
}

/// The shared document for one live room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDocument {
    pub code: RoomCode,
    pub host_id: Uuid,
    /// Snapshot of the host's list at creation time
    pub preset: Preset,
    pub participants: Vec<Participant>,
    pub roulette: RouletteState,
    pub created_at: DateTime<Utc>,
}

impl RoomDocument {
    pub fn new(code: RoomCode, host_id: Uuid, preset: Preset) -> Self {
        let now = Utc::now();
        Self {
            code,
            host_id,
            preset,
            participants: vec![Participant {
                id: host_id,
                joined_at: now,
            }],
            roulette: RouletteState::idle(),
            created_at: now,
        }
    }

    /// Add a participant; returns false if they were already present
    pub fn add_participant(&mut self, id: Uuid) -> bool {
        if self.has_participant(id) {
            return false;
        }
        self.participants.push(Participant {
            id,
            joined_at: Utc::now(),
        });
        true
    }

    pub fn has_participant(&self, id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn is_host(&self, id: Uuid) -> bool {
        self.host_id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_codes_use_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(code.as_str().chars().all(|c| ROOM_CODE_ALPHABET.contains(c)));
            for confusable in ['0', 'O', '1', 'I'] {
                assert!(!code.as_str().contains(confusable));
            }
        }
    }

    #[test]
    fn test_parse_normalizes_case() {
        let code = RoomCode::parse(" abc234 ").unwrap();
        assert_eq!(code.as_str(), "ABC234");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert!(RoomCode::parse("ABC").is_err());
        assert!(RoomCode::parse("ABCDE0").is_err());
        assert!(RoomCode::parse("ABCDEFG").is_err());
    }

    #[test]
    fn test_add_participant_is_idempotent() {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let mut doc = RoomDocument::new(
            RoomCode::parse("ABCDEF").unwrap(),
            host,
            Preset::new("Menu", MealType::All),
        );

        assert!(!doc.add_participant(host));
        assert!(doc.add_participant(guest));
        assert!(!doc.add_participant(guest));
        assert_eq!(doc.participants.len(), 2);
    }

    #[test]
    fn test_phase() {
        assert_eq!(RouletteState::idle().phase(), RoulettePhase::Idle);
        assert_eq!(RouletteState::spinning(1, 0.0).phase(), RoulettePhase::Spinning);
        assert_eq!(
            RouletteState::settled(1, "Sushi", 12.0).phase(),
            RoulettePhase::Settled
        );
    }
}
