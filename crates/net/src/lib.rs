//! BiteVibes Network Library
//!
//! TCP hub that stores shared rooms and per-user cloud documents, and the
//! client that reaches it.
//!
//! # Architecture
//!
//! - **Hub**: holds every room and user document, pushes room snapshots
//! - **HubClient**: implements the core room and cloud traits over one connection
//! - **Protocol**: length-prefixed JSON, requests matched to replies by id
//!
//! # Usage
//!
//! ```ignore
//! let hub = Hub::start("127.0.0.1:7340".parse()?).await?;
//!
//! let client = HubClient::connect(hub.addr()).await?;
//! let mut room = RoomSynchronizer::new(client, participant);
//! let code = room.create_room(&mut rng, preset).await?;
//! while let Some(event) = room.next_event().await {
//!     if event == RoomEvent::RevealDue {
//!         room.publish_reveal().await;
//!     }
//!     // react to SpinStarted / ResultRevealed / Closed
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::{ConnectionState, HubClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{Error, Result};
pub use protocol::{Message, RejectKind, Reply, Request};
pub use server::Hub;

/// Default port for BiteVibes hubs
pub const DEFAULT_PORT: u16 = 7340;
