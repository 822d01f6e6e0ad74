/// Device adapter errors
use beatflow_client::ClientError;
use beatflow_playback::PlaybackError;
use thiserror::Error;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Device adapter errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Media resource could not be fetched
    #[error("Failed to fetch media: {0}")]
    Fetch(String),

    /// Media server answered with a failure status
    #[error("Media request failed with HTTP {0}")]
    HttpStatus(u16),

    /// A later load replaced this one before it finished
    #[error("Load superseded by a newer source")]
    Superseded,

    /// Command needs a loaded source
    #[error("No media loaded")]
    NoMedia,

    /// Media element failure
    #[error("Media element error: {0}")]
    Element(String),

    /// No vendor device with this name is registered
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Vendor API failure
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        DeviceError::Fetch(err.to_string())
    }
}

impl From<DeviceError> for PlaybackError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Client(e) => e.into(),
            DeviceError::DeviceNotFound(_) => PlaybackError::AdapterNotReady,
            DeviceError::HttpStatus(status @ (403 | 404 | 410)) => {
                PlaybackError::rejected(format!("media unavailable (HTTP {status})"))
            }
            other => PlaybackError::Adapter(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_media_is_rejected() {
        let err: PlaybackError = DeviceError::HttpStatus(404).into();
        assert!(matches!(err, PlaybackError::PlaybackRejected { .. }));

        let err: PlaybackError = DeviceError::HttpStatus(500).into();
        assert!(matches!(err, PlaybackError::Adapter(msg) if msg.contains("500")));
    }

    #[test]
    fn test_client_errors_keep_their_mapping() {
        let err: PlaybackError = DeviceError::Client(ClientError::AuthRequired).into();
        assert!(matches!(err, PlaybackError::CredentialExpired));
    }
}
