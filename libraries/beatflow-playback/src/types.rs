//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference to playable media
///
/// The variant records which adapter capability is needed to play it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaRef {
    /// Direct media URL (fetched by a local media element)
    Url(String),

    /// Opaque provider URI such as `spotify:track:...` (played by a remote device)
    Uri(String),
}

impl MediaRef {
    /// Raw string form of the reference
    pub fn as_str(&self) -> &str {
        match self {
            MediaRef::Url(url) => url,
            MediaRef::Uri(uri) => uri,
        }
    }

    /// Whether this is a direct media URL
    pub fn is_url(&self) -> bool {
        matches!(self, MediaRef::Url(_))
    }
}

/// Normalized track record used throughout the player core
///
/// Produced by the resolver from raw provider payloads and never mutated
/// afterwards. The queue and the playback state hold copies of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrack {
    /// Provider track identifier
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist names in display order (never empty)
    pub artist_names: Vec<String>,

    /// Artwork URL, if the provider declared any image
    pub artwork_url: Option<String>,

    /// What to hand to the adapter
    pub media_ref: MediaRef,

    /// Track duration in milliseconds (0 if unknown)
    pub duration_ms: u64,
}

impl CanonicalTrack {
    /// Artist names joined for display
    pub fn artist_display(&self) -> String {
        self.artist_names.join(", ")
    }

    /// Whether `other` refers to the same playable track
    pub fn is_same_track(&self, other: &CanonicalTrack) -> bool {
        self.id == other.id || self.media_ref == other.media_ref
    }
}

/// Playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Nothing loaded
    Idle,

    /// A `play` was issued and is waiting for the adapter to confirm
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Track reached its natural end
    Ended,

    /// The adapter failed; a new `play` is required
    Error,
}

impl PlaybackStatus {
    /// Whether a track is active (playing or paused)
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }
}

/// Observable playback state
///
/// Owned by [`crate::PlaybackManager`]; everyone else only sees copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Current status
    pub status: PlaybackStatus,

    /// Track confirmed by the adapter
    pub current_track: Option<CanonicalTrack>,

    /// Target of an in-flight `play`
    pub loading_track: Option<CanonicalTrack>,

    /// Playback position in milliseconds
    pub position_ms: u64,

    /// Duration of the current track in milliseconds
    pub duration_ms: u64,

    /// Volume in [0, 1]
    pub volume: f32,

    /// Reason for the last failure, set while in `Error`
    pub error: Option<String>,
}

impl PlaybackState {
    pub(crate) fn new(volume: f32) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_track: None,
            loading_track: None,
            position_ms: 0,
            duration_ms: 0,
            volume,
            error: None,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(PlaybackConfig::default().volume)
    }
}

/// Repeat mode applied when a track ends naturally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the queue
    Off,

    /// Wrap around to the start of the queue
    All,

    /// Replay the current track
    One,
}

/// Configuration for the playback state machine and its driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Initial volume in [0, 1] (default: 0.5)
    pub volume: f32,

    /// Repeat mode for auto-advance (default: All)
    pub repeat: RepeatMode,

    /// Progress clock tick interval (default: 250ms)
    pub tick_interval: Duration,

    /// Upper bound for an adapter `load` (default: 10s)
    pub load_timeout: Duration,

    /// Upper bound for play/pause/seek/volume calls (default: 5s)
    pub command_timeout: Duration,

    /// Flip play/pause immediately instead of waiting for the adapter (default: false)
    pub optimistic_toggle: bool,

    /// Past this position, "previous" restarts the current track (default: 3000ms)
    pub restart_threshold_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            repeat: RepeatMode::All,
            tick_interval: Duration::from_millis(250),
            load_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            optimistic_toggle: false,
            restart_threshold_ms: 3000,
        }
    }
}
