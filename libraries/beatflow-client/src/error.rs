//! Error types for the BeatFlow client.

use beatflow_playback::PlaybackError;
use thiserror::Error;

/// Errors that can occur when talking to the BeatFlow backend or the vendor API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Authentication required but no token available (or the token was refused)
    #[error("Authentication required")]
    AuthRequired,

    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// The vendor refused a playback command (e.g. account tier)
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error while persisting credentials
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode or decode stored data
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for PlaybackError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthRequired
            | ClientError::AuthFailed(_)
            | ClientError::TokenRefreshFailed(_) => PlaybackError::CredentialExpired,
            ClientError::PlaybackRejected(reason) => PlaybackError::PlaybackRejected { reason },
            ClientError::NotFound(message) => PlaybackError::PlaybackRejected { reason: message },
            other => PlaybackError::Adapter(other.to_string()),
        }
    }
}
