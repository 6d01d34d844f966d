//! Room transport boundary
//!
//! The synchronizer talks to whatever stores the shared room documents
//! through [`RoomTransport`]. The hub client in `bitevibes-net` is the real
//! implementation; [`MemoryRoomTransport`] keeps everything in-process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{RoomCode, RoomDocument, RouletteState};

/// Stream of room snapshots; dropping it unsubscribes
///
/// The stream ends when the room is destroyed.
pub type RoomFeed = mpsc::UnboundedReceiver<RoomDocument>;

/// Shared room storage as seen by one participant
#[allow(async_fn_in_trait)]
pub trait RoomTransport {
    /// Store a new room; fails with `RoomExists` if the code is taken
    async fn create(&self, room: &RoomDocument) -> Result<()>;

    /// Add a participant and return the room, or `None` if there is no such room
    async fn join(&self, code: &RoomCode, participant: Uuid) -> Result<Option<RoomDocument>>;

    /// Receive the current snapshot immediately and every change after it
    async fn subscribe(&self, code: &RoomCode) -> Result<RoomFeed>;

    /// Overwrite the room's roulette state
    async fn publish(&self, code: &RoomCode, state: &RouletteState) -> Result<()>;

    /// Delete the room and end every subscriber's feed
    async fn destroy(&self, code: &RoomCode) -> Result<()>;
}

struct MemoryRoom {
    doc: RoomDocument,
    subscribers: Vec<mpsc::UnboundedSender<RoomDocument>>,
}

impl MemoryRoom {
    fn broadcast(&mut self) {
        let doc = &self.doc;
        self.subscribers.retain(|tx| tx.send(doc.clone()).is_ok());
    }
}

struct MemoryRooms {
    rooms: HashMap<RoomCode, MemoryRoom>,
    reachable: bool,
    publishes: u64,
}

/// In-process room store
///
/// Clones share the same rooms, so several synchronizers can meet in one
/// room. Used for tests and for offline play.
#[derive(Clone)]
pub struct MemoryRoomTransport {
    inner: Arc<Mutex<MemoryRooms>>,
}

impl MemoryRoomTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryRooms {
                rooms: HashMap::new(),
                reachable: true,
                publishes: 0,
            })),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Current document for a room
    pub fn room(&self, code: &RoomCode) -> Option<RoomDocument> {
        self.lock().rooms.get(code).map(|r| r.doc.clone())
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    pub fn publish_count(&self) -> u64 {
        self.lock().publishes
    }

    /// Push the current snapshot to all subscribers again
    pub fn redeliver(&self, code: &RoomCode) {
        if let Some(room) = self.lock().rooms.get_mut(code) {
            room.broadcast();
        }
    }

    /// Push an arbitrary (possibly stale) snapshot to all subscribers
    pub fn deliver(&self, doc: RoomDocument) {
        if let Some(room) = self.lock().rooms.get_mut(&doc.code) {
            room.subscribers.retain(|tx| tx.send(doc.clone()).is_ok());
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRooms> {
        // A poisoned lock only means a test panicked mid-update
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reachable(&self) -> Result<MutexGuard<'_, MemoryRooms>> {
        let guard = self.lock();
        if !guard.reachable {
            return Err(Error::Transport("room backend unreachable".into()));
        }
        Ok(guard)
    }
}

impl Default for MemoryRoomTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomTransport for MemoryRoomTransport {
    async fn create(&self, room: &RoomDocument) -> Result<()> {
        let mut state = self.reachable()?;
        if state.rooms.contains_key(&room.code) {
            return Err(Error::RoomExists(room.code.to_string()));
        }
        state.rooms.insert(
            room.code.clone(),
            MemoryRoom {
                doc: room.clone(),
                subscribers: Vec::new(),
            },
        );
        debug!(code = %room.code, "Room stored");
        Ok(())
    }

    async fn join(&self, code: &RoomCode, participant: Uuid) -> Result<Option<RoomDocument>> {
        let mut state = self.reachable()?;
        let Some(room) = state.rooms.get_mut(code) else {
            return Ok(None);
        };
        if room.doc.add_participant(participant) {
            room.broadcast();
        }
        Ok(Some(room.doc.clone()))
    }

    async fn subscribe(&self, code: &RoomCode) -> Result<RoomFeed> {
        let mut state = self.reachable()?;
        let room = state
            .rooms
            .get_mut(code)
            .ok_or_else(|| Error::RoomNotFound(code.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so the initial send cannot fail
        let _ = tx.send(room.doc.clone());
        room.subscribers.push(tx);
        Ok(rx)
    }

    async fn publish(&self, code: &RoomCode, roulette: &RouletteState) -> Result<()> {
        let mut state = self.reachable()?;
        state.publishes += 1;
        let room = state
            .rooms
            .get_mut(code)
            .ok_or_else(|| Error::RoomNotFound(code.to_string()))?;
        room.doc.roulette = roulette.clone();
        room.broadcast();
        Ok(())
    }

    async fn destroy(&self, code: &RoomCode) -> Result<()> {
        let mut state = self.reachable()?;
        if state.rooms.remove(code).is_some() {
            debug!(code = %code, "Room destroyed");
        }
        Ok(())
    }
}
