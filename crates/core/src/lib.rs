//! BiteVibes Core Library
//!
//! Spin physics, selection, the local spin controller, shared room
//! synchronization, history, menus and storage for the BiteVibes roulette.

pub mod cloud;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod invariants;
pub mod menu;
pub mod models;
pub mod physics;
pub mod room;
pub mod selection;
pub mod share;
pub mod storage;
pub mod ticks;

pub use cloud::{CloudStore, DebouncedSave, MemoryCloud};
pub use config::{Config, ConfigError};
pub use controller::{SpinController, SpinEvent, SpinSnapshot, SpinStatus};
pub use error::{Error, Result};
pub use history::{HistoryRecorder, MAX_LOCAL_HISTORY};
pub use menu::{MenuBook, MenuData};
pub use models::*;
pub use room::{
    MemoryRoomTransport, RoomEvent, RoomFeed, RoomRole, RoomSynchronizer, RoomTransport,
};
pub use storage::{Database, HistoryRepository, MenuRepository, Storage};
pub use ticks::{FrameQueue, TickSource, TickToken};
