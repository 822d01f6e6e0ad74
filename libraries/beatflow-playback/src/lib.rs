//! BeatFlow - Player Core
//!
//! Platform-agnostic playback core for BeatFlow.
//!
//! This crate provides:
//! - Track resolution from heterogeneous provider payloads
//! - Queue with wraparound navigation and repeat policy
//! - Playback state machine reconciled from adapter events
//! - Progress clock extrapolating position between reports
//! - The [`PlaybackAdapter`] interface implemented by platform crates
//! - An async [`Player`] driver publishing state and events
//!
//! # Architecture
//!
//! `beatflow-playback` performs no I/O of its own:
//! - No HTTP client (remote device control lives in `beatflow-device`)
//! - No media decoding or output
//! - No credential handling (adapters read tokens through a provider)
//!
//! # Example: Resolving and queueing tracks
//!
//! ```rust
//! use beatflow_playback::{resolve_value, MediaRef, Queue};
//! use serde_json::json;
//!
//! let raw = json!({
//!     "id": "Xk2pLm",
//!     "name": "Kesariya",
//!     "duration": 268,
//!     "primaryArtists": "Arijit Singh",
//!     "downloadUrl": [
//!         { "quality": "96kbps", "url": "https://cdn.example/96.mp4" },
//!         { "quality": "320kbps", "url": "https://cdn.example/320.mp4" }
//!     ]
//! });
//!
//! let track = resolve_value(&raw).unwrap();
//! assert_eq!(track.media_ref, MediaRef::Url("https://cdn.example/320.mp4".into()));
//! assert_eq!(track.duration_ms, 268_000);
//!
//! let mut queue = Queue::new();
//! queue.set_queue(vec![track.clone()], 0);
//! assert_eq!(queue.advance().unwrap().id, track.id);
//! ```
//!
//! # Example: Driving a player
//!
//! ```rust,no_run
//! use beatflow_playback::{PlaybackAdapter, PlaybackConfig, Player};
//! use std::sync::Arc;
//!
//! # async fn run(adapter: Arc<dyn PlaybackAdapter>, raw: serde_json::Value) -> beatflow_playback::Result<()> {
//! let player = Player::spawn(adapter, PlaybackConfig::default());
//! let mut state = player.subscribe();
//!
//! player.play_raw(&raw).await?;
//! while state.changed().await.is_ok() {
//!     println!("{:?} at {}ms", state.borrow().status, state.borrow().position_ms);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod clock;
mod error;
pub mod events;
mod manager;
mod player;
mod queue;
pub mod resolver;
pub mod types;
mod volume;

// Public exports
pub use adapter::{
    AdapterEvent, Capabilities, DeviceState, PlaybackAdapter, StateHandler, StateListeners,
};
pub use clock::ProgressClock;
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use manager::{LoadRequest, PlaybackManager, PreviousAction, ToggleAction};
pub use player::{Player, PlayerHandle};
pub use queue::Queue;
pub use resolver::{resolve, resolve_all, resolve_value, RawTrack, TrackPayload};
pub use types::{
    CanonicalTrack, MediaRef, PlaybackConfig, PlaybackState, PlaybackStatus, RepeatMode,
};
pub use volume::{clamp_volume, to_percent, Volume};
