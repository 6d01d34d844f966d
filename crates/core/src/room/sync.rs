//! Shared room synchronizer
//!
//! One synchronizer per participant. The host computes every outcome on its
//! own device and writes it to the room; everyone (the host included) learns
//! about spins and results only through the room feed.
//!
//! The host publishes `spinning` at once and the settled state after a fixed
//! reveal delay so observers' own animations have time to play. That delay
//! is a pending timer owned by the synchronizer; leaving the room drops it.
//! When it expires [`RoomSynchronizer::next_event`] reports
//! [`RoomEvent::RevealDue`] and the host awaits
//! [`RoomSynchronizer::publish_reveal`] outside any `select!`.

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::observer::{ResultObserver, Transition};
use super::transport::{RoomFeed, RoomTransport};
use crate::error::{Error, Result};
use crate::invariants::{assert_room_invariants, check_room};
use crate::models::{Preset, RoomCode, RoomDocument, RouletteState};
use crate::physics::{self, SpinState};
use crate::selection;

/// Delay between publishing `spinning` and publishing the result
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_secs(3);

/// Fresh codes drawn when the backend reports a collision
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomRole {
    Host,
    Guest,
}

/// What a participant should react to
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// A new snapshot arrived with nothing else to announce
    Updated,
    /// The host started a spin; play a cosmetic animation
    SpinStarted { episode: u64 },
    /// The host's reveal delay expired; await `publish_reveal` next
    RevealDue,
    /// The host's spin settled
    ResultRevealed {
        episode: u64,
        result: String,
        angle: f64,
    },
    /// Publishing the result failed; the spin is abandoned
    TransportFailed(String),
    /// The room no longer exists
    Closed,
}

struct PendingReveal {
    due: Instant,
    state: RouletteState,
}

struct RoomSession {
    code: RoomCode,
    role: RoomRole,
    feed: RoomFeed,
    room: RoomDocument,
    observer: ResultObserver,
    last_episode: u64,
    pending: Option<PendingReveal>,
}

impl RoomSession {
    fn new(role: RoomRole, feed: RoomFeed, room: RoomDocument) -> Self {
        Self {
            code: room.code.clone(),
            role,
            feed,
            last_episode: room.roulette.episode,
            room,
            observer: ResultObserver::new(),
            pending: None,
        }
    }

    fn next_episode(&self) -> u64 {
        self.room.roulette.episode.max(self.last_episode) + 1
    }
}

pub struct RoomSynchronizer<T: RoomTransport> {
    transport: T,
    participant: Uuid,
    reveal_delay: Duration,
    session: Option<RoomSession>,
}

impl<T: RoomTransport> RoomSynchronizer<T> {
    pub fn new(transport: T, participant: Uuid) -> Self {
        Self {
            transport,
            participant,
            reveal_delay: DEFAULT_REVEAL_DELAY,
            session: None,
        }
    }

    pub fn with_reveal_delay(mut self, delay: Duration) -> Self {
        self.reveal_delay = delay;
        self
    }

    pub fn participant(&self) -> Uuid {
        self.participant
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn role(&self) -> Option<RoomRole> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn is_host(&self) -> bool {
        self.role() == Some(RoomRole::Host)
    }

    pub fn code(&self) -> Option<&RoomCode> {
        self.session.as_ref().map(|s| &s.code)
    }

    /// Latest snapshot of the current room
    pub fn room(&self) -> Option<&RoomDocument> {
        self.session.as_ref().map(|s| &s.room)
    }

    /// Whether a result is waiting to be published
    pub fn has_pending_reveal(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pending.is_some())
    }

    /// Create a room as host with a snapshot of `preset`
    ///
    /// A code collision draws a new code; any other failure is returned
    /// as-is for the user to retry.
    pub async fn create_room<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        preset: Preset,
    ) -> Result<RoomCode> {
        self.ensure_not_in_room()?;

        let mut attempt = 0;
        let room = loop {
            attempt += 1;
            let room = RoomDocument::new(RoomCode::generate(rng), self.participant, preset.clone());
            assert_room_invariants(&room);
            match self.transport.create(&room).await {
                Ok(()) => break room,
                Err(Error::RoomExists(code)) if attempt < MAX_CODE_ATTEMPTS => {
                    debug!(code = %code, attempt, "Room code taken, drawing another");
                }
                Err(e) => return Err(e),
            }
        };

        let feed = match self.transport.subscribe(&room.code).await {
            Ok(feed) => feed,
            Err(e) => {
                // Nobody can ever join a room whose host is not listening
                if let Err(cleanup) = self.transport.destroy(&room.code).await {
                    warn!(code = %room.code, "Failed to remove orphaned room: {}", cleanup);
                }
                return Err(e);
            }
        };

        let code = room.code.clone();
        info!(code = %code, items = room.preset.items.len(), "Room created");
        self.session = Some(RoomSession::new(RoomRole::Host, feed, room));
        Ok(code)
    }

    /// Join an existing room; joining twice keeps a single participant entry
    pub async fn join_room(&mut self, code: &RoomCode) -> Result<RoomDocument> {
        self.ensure_not_in_room()?;

        let room = self
            .transport
            .join(code, self.participant)
            .await?
            .ok_or_else(|| Error::RoomNotFound(code.to_string()))?;
        let feed = self.transport.subscribe(code).await?;

        let role = if room.is_host(self.participant) {
            RoomRole::Host
        } else {
            RoomRole::Guest
        };
        info!(code = %code, ?role, participants = room.participants.len(), "Joined room");
        self.session = Some(RoomSession::new(role, feed, room.clone()));
        Ok(room)
    }

    /// Ask for a spin
    ///
    /// Only the host spins; for anyone else, while a result is still pending,
    /// or for a list without enabled items this returns `Ok(false)` and
    /// publishes nothing.
    pub async fn request_spin<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::InvalidInput("not in a room".into()));
        };
        if session.role != RoomRole::Host {
            debug!(code = %session.code, "Spin request ignored: not the host");
            return Ok(false);
        }
        if session.pending.is_some() {
            debug!(code = %session.code, "Spin request ignored: result pending");
            return Ok(false);
        }

        let items = session.room.preset.enabled_items();
        let start = SpinState::new(session.room.roulette.angle, physics::initial_velocity(rng));
        let (rest, steps) = physics::run_to_rest(start);
        let Some(item) = selection::select(rest.angle, items.len()).and_then(|i| items.get(i))
        else {
            debug!(code = %session.code, "Spin request ignored: no enabled items");
            return Ok(false);
        };

        let episode = session.next_episode();
        self.transport
            .publish(&session.code, &RouletteState::spinning(episode, start.angle))
            .await?;

        info!(
            code = %session.code,
            episode,
            steps,
            result = %item.name,
            "Room spin started"
        );
        session.last_episode = episode;
        session.pending = Some(PendingReveal {
            due: Instant::now() + self.reveal_delay,
            state: RouletteState::settled(episode, item.name.clone(), rest.angle),
        });
        Ok(true)
    }

    /// Wait for the next thing worth reacting to
    ///
    /// Returns `None` when not in a room. Cancel-safe: this only waits on
    /// the feed and the reveal timer, so dropping it inside `select!` loses
    /// nothing. A host sees [`RoomEvent::RevealDue`] once the reveal delay
    /// has passed, and again on every call until the reveal is published.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        let session = self.session.as_mut()?;
        let due = session.pending.as_ref().map(|p| p.due);
        let snapshot = tokio::select! {
            snapshot = session.feed.recv() => snapshot,
            _ = reveal_timer(due) => return Some(RoomEvent::RevealDue),
        };

        match snapshot {
            Some(room) => self.apply(room),
            None => {
                if let Some(session) = self.session.take() {
                    info!(code = %session.code, "Room closed");
                }
                Some(RoomEvent::Closed)
            }
        }
    }

    /// Leave the current room
    ///
    /// Any pending reveal is dropped. A host leaving destroys the room.
    pub async fn leave(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if session.pending.is_some() {
            debug!(code = %session.code, "Dropping pending reveal");
        }
        drop(session.feed);

        if session.role == RoomRole::Host {
            self.transport.destroy(&session.code).await?;
            info!(code = %session.code, "Room closed by host");
        } else {
            info!(code = %session.code, "Left room");
        }
        Ok(())
    }

    fn apply(&mut self, room: RoomDocument) -> Option<RoomEvent> {
        let session = self.session.as_mut()?;
        if let Err(problem) = check_room(&room) {
            warn!(code = %session.code, "Ignoring malformed room snapshot: {}", problem);
            return Some(RoomEvent::Updated);
        }
        if room.code != session.code {
            warn!(code = %session.code, other = %room.code, "Ignoring snapshot for another room");
            return Some(RoomEvent::Updated);
        }

        let transition = session.observer.observe(&room.roulette);
        session.last_episode = session.last_episode.max(room.roulette.episode);
        session.room = room;

        Some(match transition {
            Some(Transition::Started { episode }) => RoomEvent::SpinStarted { episode },
            Some(Transition::Revealed {
                episode,
                result,
                angle,
            }) => RoomEvent::ResultRevealed {
                episode,
                result,
                angle,
            },
            None => RoomEvent::Updated,
        })
    }

    /// Publish the host's pending result once its delay has passed
    ///
    /// Returns `Some(TransportFailed)` when the write fails; the pending
    /// result is cleared either way. Not cancel-safe: await it to
    /// completion, never as a `select!` branch.
    pub async fn publish_reveal(&mut self) -> Option<RoomEvent> {
        let session = self.session.as_mut()?;
        let pending = session.pending.as_ref()?;
        if pending.due > Instant::now() {
            return None;
        }
        let state = pending.state.clone();

        if session.role != RoomRole::Host {
            session.pending = None;
            warn!(code = %session.code, "Refusing to publish a result without the host role");
            return None;
        }

        let published = self.transport.publish(&session.code, &state).await;
        session.pending = None;
        match published {
            Ok(()) => {
                debug!(code = %session.code, episode = state.episode, "Result published");
                None
            }
            Err(e) => {
                warn!(code = %session.code, "Failed to publish result: {}", e);
                Some(RoomEvent::TransportFailed(e.to_string()))
            }
        }
    }

    fn ensure_not_in_room(&self) -> Result<()> {
        match &self.session {
            Some(session) => Err(Error::InvalidInput(format!(
                "already in room {}",
                session.code
            ))),
            None => Ok(()),
        }
    }
}

async fn reveal_timer(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}
