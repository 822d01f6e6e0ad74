//! Playback backend adapter interface
//!
//! The player core never talks to a media element or a vendor API directly.
//! Platform crates implement [`PlaybackAdapter`] and report what the
//! underlying system is doing through [`AdapterEvent`]s.

use crate::error::Result;
use crate::types::{CanonicalTrack, MediaRef};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Snapshot reported by the underlying playback system
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_paused: bool,
    /// The track reached its natural end
    pub ended: bool,
    /// `None` when the device is not playing anything
    pub track: Option<CanonicalTrack>,
}

impl DeviceState {
    /// State reported when nothing is loaded on the device
    pub fn stopped() -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            is_paused: true,
            ended: false,
            track: None,
        }
    }
}

/// Notifications from an adapter
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// Device/element is ready to accept commands
    Ready { device_id: Option<String> },

    /// Device went offline
    NotReady { device_id: Option<String> },

    /// Playback state changed
    StateChanged(DeviceState),

    /// Asynchronous failure reported by the underlying system
    Error { message: String },
}

/// Handler registered through [`PlaybackAdapter::on_state_change`]
pub type StateHandler = Arc<dyn Fn(AdapterEvent) + Send + Sync>;

/// What kinds of media reference an adapter can play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub direct_urls: bool,
    pub opaque_uris: bool,
}

impl Capabilities {
    /// Whether `media` can be handed to this adapter
    pub fn can_play(&self, media: &MediaRef) -> bool {
        match media {
            MediaRef::Url(_) => self.direct_urls,
            MediaRef::Uri(_) => self.opaque_uris,
        }
    }
}

/// Polymorphic playback backend
///
/// Controls fail with [`crate::PlaybackError::AdapterNotReady`] until the
/// device/element has signaled readiness. Errors are always propagated,
/// never swallowed.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Media references this adapter can play
    fn capabilities(&self) -> Capabilities;

    /// Whether commands will currently be accepted
    fn is_ready(&self) -> bool;

    /// Prepare `track` and start it
    async fn load(&self, track: &CanonicalTrack) -> Result<()>;

    /// Resume playback
    async fn play(&self) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;

    /// Seek to `position_ms`
    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Set volume in [0, 1]
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Register a handler for state changes
    fn on_state_change(&self, handler: StateHandler);
}

/// Registered handlers, shared by adapter implementations
#[derive(Default, Clone)]
pub struct StateListeners {
    handlers: Arc<Mutex<Vec<StateHandler>>>,
}

impl StateListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler
    pub fn register(&self, handler: StateHandler) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push(handler);
        }
    }

    /// Invoke every handler with `event`
    pub fn emit(&self, event: AdapterEvent) {
        let handlers = match self.handlers.lock() {
            Ok(handlers) => handlers.clone(),
            Err(_) => return,
        };
        for handler in handlers {
            handler(event.clone());
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StateListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateListeners")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn capabilities_gate_media_kinds() {
        let local = Capabilities {
            direct_urls: true,
            opaque_uris: false,
        };
        assert!(local.can_play(&MediaRef::Url("https://cdn/a.mp4".into())));
        assert!(!local.can_play(&MediaRef::Uri("spotify:track:1".into())));
    }

    #[test]
    fn listeners_fan_out() {
        let listeners = StateListeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            listeners.register(Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        listeners.emit(AdapterEvent::StateChanged(DeviceState::stopped()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(listeners.len(), 2);
    }
}
