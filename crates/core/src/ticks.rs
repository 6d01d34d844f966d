//! Frame tick scheduling
//!
//! The spin controller never sleeps or loops on its own. It asks a
//! [`TickSource`] for "one more frame" and is handed the matching
//! [`TickToken`] when that frame arrives. The host environment decides what a
//! frame is: a 60 Hz interval in the app, or an explicit `fire` in tests.

/// Identifies one scheduled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(u64);

impl TickToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Something that can deliver the next animation frame
pub trait TickSource {
    /// Request exactly one future frame
    fn schedule(&mut self) -> TickToken;

    /// Withdraw a previously requested frame; unknown tokens are ignored
    fn cancel(&mut self, token: TickToken);
}

/// Single-slot frame queue
///
/// Holds at most one outstanding frame, mirroring a display-refresh
/// callback. The owner pulls due frames with [`FrameQueue::fire`].
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Option<TickToken>,
    scheduled: u64,
    cancelled: u64,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the outstanding frame, if any
    pub fn fire(&mut self) -> Option<TickToken> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Total frames requested since creation
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled
    }

    /// Total frames withdrawn before they fired
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }
}

impl TickSource for FrameQueue {
    fn schedule(&mut self) -> TickToken {
        debug_assert!(
            self.pending.is_none(),
            "frame {:?} still outstanding when another was requested",
            self.pending
        );
        self.next_id += 1;
        self.scheduled += 1;
        let token = TickToken(self.next_id);
        self.pending = Some(token);
        token
    }

    fn cancel(&mut self, token: TickToken) {
        if self.pending == Some(token) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}
