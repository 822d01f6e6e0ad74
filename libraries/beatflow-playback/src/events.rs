//! Playback Events
//!
//! Event-based communication for UI synchronization. The full state is
//! published separately; events describe what changed and why.

use crate::types::PlaybackStatus;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback status changed
    StateChanged {
        /// The new status
        status: PlaybackStatus,
    },

    /// The confirmed current track changed
    TrackChanged {
        /// ID of the new (current) track, `None` when playback stopped
        track_id: Option<String>,
        /// ID of the previous track (if any)
        previous_track_id: Option<String>,
    },

    /// Track finished playing naturally (reached end)
    TrackFinished {
        /// ID of the finished track
        track_id: String,
    },

    /// Position update (from adapter reports and the local clock)
    PositionUpdate {
        /// Current playback position
        position_ms: u64,
        /// Total track duration
        duration_ms: u64,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume level (0.0-1.0)
        level: f32,
    },

    /// Queue replaced
    QueueChanged {
        /// New queue length
        length: usize,
        /// Selected index
        cursor: Option<usize>,
    },

    /// Adapter became ready (remote device registered)
    AdapterReady {
        /// Device identifier, for remote devices
        device_id: Option<String>,
    },

    /// Adapter not ready; commands will be refused until it is
    AdapterNotReady,

    /// Error surfaced to the user
    Error {
        /// Error message
        message: String,
    },
}
