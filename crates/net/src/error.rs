//! Network error types

use std::io;

use crate::protocol::RejectKind;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request rejected ({kind:?}): {message}")]
    Rejected { kind: RejectKind, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Request timed out")]
    Timeout,
}

impl From<Error> for bitevibes_core::Error {
    fn from(e: Error) -> Self {
        use bitevibes_core::Error as CoreError;
        match e {
            Error::Rejected {
                kind: RejectKind::RoomNotFound,
                message,
            } => CoreError::RoomNotFound(message),
            Error::Rejected {
                kind: RejectKind::RoomExists,
                message,
            } => CoreError::RoomExists(message),
            Error::Rejected {
                kind: RejectKind::Invalid,
                message,
            } => CoreError::InvalidInput(message),
            other => CoreError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_keep_their_meaning() {
        let core: bitevibes_core::Error = Error::Rejected {
            kind: RejectKind::RoomExists,
            message: "ABCDEF".into(),
        }
        .into();
        assert!(matches!(core, bitevibes_core::Error::RoomExists(ref c) if c == "ABCDEF"));

        let core: bitevibes_core::Error = Error::Timeout.into();
        assert!(core.is_retryable());
    }
}
