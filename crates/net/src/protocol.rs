//! Hub protocol message types
//!
//! Clients send [`Request`]s tagged with a correlation id and get exactly
//! one [`Reply`] with the same id. Room snapshots are pushed unprompted to
//! every connection subscribed to that room.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bitevibes_core::menu::MenuData;
use bitevibes_core::models::{HistoryEntry, RoomCode, RoomDocument, RouletteState};

/// Why the hub refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    RoomNotFound,
    RoomExists,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Ping,
    SignIn,
    CreateRoom { room: RoomDocument },
    JoinRoom { code: RoomCode, participant: Uuid },
    Subscribe { code: RoomCode },
    Publish { code: RoomCode, roulette: RouletteState },
    DestroyRoom { code: RoomCode },
    LoadMenu { user: Uuid },
    SaveMenu { user: Uuid, data: MenuData },
    AppendHistory { user: Uuid, entry: HistoryEntry },
    RecentHistory { user: Uuid, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Pong,
    SignedIn { user: Uuid },
    Joined { room: Option<RoomDocument> },
    Menu { data: Option<MenuData> },
    History { entries: Vec<HistoryEntry> },
    Rejected { kind: RejectKind, message: String },
}

impl Reply {
    pub fn rejected(kind: RejectKind, message: impl Into<String>) -> Self {
        Reply::Rejected {
            kind,
            message: message.into(),
        }
    }
}

/// Everything that crosses the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Client to hub
    Request { id: u64, request: Request },

    /// Hub to client, answering request `id`
    Reply { id: u64, reply: Reply },

    /// Client no longer wants pushes for this room
    Unsubscribe { code: RoomCode },

    /// Current state of a subscribed room
    RoomSnapshot { room: RoomDocument },

    /// A subscribed room was destroyed
    RoomClosed { code: RoomCode },
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitevibes_core::models::{MealType, Preset};

    #[test]
    fn test_wire_shape() {
        let msg = Message::Request {
            id: 3,
            request: Request::Publish {
                code: RoomCode::parse("ABCDEF").unwrap(),
                roulette: RouletteState::spinning(2, 90.0),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Request");
        assert_eq!(json["request"]["op"], "publish");
        assert_eq!(json["request"]["code"], "ABCDEF");
        assert_eq!(json["request"]["roulette"]["episode"], 2);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let room = RoomDocument::new(
            RoomCode::parse("HJKMNP").unwrap(),
            Uuid::new_v4(),
            Preset::new("Menu", MealType::Lunch),
        );
        let msg = Message::RoomSnapshot { room };
        let bytes = serde_json::to_vec(&msg).unwrap();
        assert_eq!(serde_json::from_slice::<Message>(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_bad_room_code_is_rejected_on_decode() {
        let json = r#"{"type":"Unsubscribe","code":"0O1I00"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }
}
