//! BeatFlow command-line player
//!
//! Configuration and error types for the `beatflow` binary.

pub mod config;
pub mod error;

pub use config::{ApiSettings, AuthSettings, BeatFlowConfig, PlayerSettings};
pub use error::{reports_expired_credential, CliError, Result};
