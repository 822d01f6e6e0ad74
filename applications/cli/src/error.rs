//! CLI error types

use beatflow_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Nothing playable: {0}")]
    NothingToPlay(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Vendor session expired; run `beatflow login <redirect-url>` again")]
    SessionExpired,
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Whether a playback error message reports a rejected access token
///
/// The player wraps device-side reports, so the expiry text may be embedded.
pub fn reports_expired_credential(message: &str) -> bool {
    message.contains(&PlaybackError::CredentialExpired.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_credential_messages() {
        let expired = PlaybackError::CredentialExpired.to_string();
        assert!(reports_expired_credential(&expired));

        let wrapped = PlaybackError::rejected(expired).to_string();
        assert!(reports_expired_credential(&wrapped));

        assert!(!reports_expired_credential("Playback rejected: Premium required"));
        assert!(!reports_expired_credential(""));
    }
}
