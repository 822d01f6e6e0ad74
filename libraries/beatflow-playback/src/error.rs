//! Error types for playback management

use crate::types::PlaybackStatus;
use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// Raw payload has nothing to play
    #[error("Malformed track: {0}")]
    MalformedTrack(String),

    /// Queue is empty
    #[error("Queue is empty")]
    EmptyQueue,

    /// Command issued before the device/element signaled readiness
    #[error("Player is not ready yet, please wait")]
    AdapterNotReady,

    /// The underlying system refused the operation
    #[error("Playback rejected: {reason}")]
    PlaybackRejected { reason: String },

    /// Access credential is missing, expired or revoked
    #[error("Access credential expired")]
    CredentialExpired,

    /// Adapter call did not resolve in time
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Command is not valid in the current status
    #[error("Cannot {operation} while {status:?}")]
    InvalidState {
        operation: &'static str,
        status: PlaybackStatus,
    },

    /// Any other adapter failure (network, backend)
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// The player task is gone
    #[error("Player has shut down")]
    PlayerClosed,
}

impl PlaybackError {
    /// Create a rejection error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::PlaybackRejected {
            reason: reason.into(),
        }
    }

    /// Transient errors are surfaced but never move the player to `Error`
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::AdapterNotReady
                | PlaybackError::EmptyQueue
                | PlaybackError::InvalidState { .. }
        )
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
