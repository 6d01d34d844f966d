//! Live rooms
//!
//! A room is a shared document with one host. The host is the only writer
//! of the roulette state; guests watch it and animate on their own.

mod observer;
mod sync;
mod transport;

pub use observer::{ResultObserver, Transition};
pub use sync::{RoomEvent, RoomRole, RoomSynchronizer, DEFAULT_REVEAL_DELAY};
pub use transport::{MemoryRoomTransport, RoomFeed, RoomTransport};
