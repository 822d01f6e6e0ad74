//! Local media adapter
//!
//! Plays direct media URLs through a [`MediaElement`] and translates element
//! events into [`AdapterEvent`]s for the player.

use crate::media::{ElementEvent, MediaElement};
use async_trait::async_trait;
use beatflow_playback::{
    AdapterEvent, CanonicalTrack, Capabilities, DeviceState, MediaRef, PlaybackAdapter,
    PlaybackError, Result, StateHandler, StateListeners,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// What the element is doing, as last reported
#[derive(Debug, Clone)]
struct ElementSnapshot {
    track: Option<CanonicalTrack>,
    position_ms: u64,
    duration_ms: u64,
    is_paused: bool,
}

impl ElementSnapshot {
    fn to_state(&self, ended: bool) -> DeviceState {
        DeviceState {
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            is_paused: self.is_paused,
            ended,
            track: self.track.clone(),
        }
    }
}

/// Adapter over a local media element
///
/// Always ready. Only direct media URLs can be played.
pub struct LocalMediaAdapter {
    element: Arc<dyn MediaElement>,
    listeners: StateListeners,
    snapshot: Arc<Mutex<ElementSnapshot>>,
    load_generation: AtomicU64,
}

impl LocalMediaAdapter {
    pub fn new(element: Arc<dyn MediaElement>) -> Self {
        let listeners = StateListeners::new();
        let snapshot = Arc::new(Mutex::new(ElementSnapshot {
            track: None,
            position_ms: 0,
            duration_ms: 0,
            is_paused: true,
        }));

        let forward_to = listeners.clone();
        let shared = Arc::clone(&snapshot);
        element.subscribe(Arc::new(move |event| {
            if let Some(event) = translate(&shared, event) {
                forward_to.emit(event);
            }
        }));

        Self {
            element,
            listeners,
            snapshot,
            load_generation: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, ElementSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn translate(snapshot: &Mutex<ElementSnapshot>, event: ElementEvent) -> Option<AdapterEvent> {
    let mut snapshot = snapshot.lock().unwrap_or_else(PoisonError::into_inner);
    let ended = match event {
        ElementEvent::LoadedMetadata { duration_ms } => {
            if duration_ms > 0 {
                snapshot.duration_ms = duration_ms;
            }
            snapshot.position_ms = 0;
            false
        }
        ElementEvent::TimeUpdate { position_ms } => {
            snapshot.position_ms = position_ms;
            false
        }
        ElementEvent::Playing => {
            snapshot.is_paused = false;
            false
        }
        ElementEvent::Paused => {
            snapshot.is_paused = true;
            false
        }
        ElementEvent::Ended => {
            snapshot.is_paused = true;
            snapshot.position_ms = snapshot.duration_ms;
            true
        }
        ElementEvent::Error { message } => return Some(AdapterEvent::Error { message }),
    };

    // Nothing to report before the first track
    snapshot.track.as_ref()?;
    Some(AdapterEvent::StateChanged(snapshot.to_state(ended)))
}

#[async_trait]
impl PlaybackAdapter for LocalMediaAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direct_urls: true,
            opaque_uris: false,
        }
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn load(&self, track: &CanonicalTrack) -> Result<()> {
        let MediaRef::Url(url) = &track.media_ref else {
            return Err(PlaybackError::rejected(
                "local media element cannot play provider URIs",
            ));
        };

        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = {
            let mut snapshot = self.snapshot();
            let previous = snapshot.clone();
            snapshot.track = Some(track.clone());
            snapshot.position_ms = 0;
            snapshot.duration_ms = track.duration_ms;
            snapshot.is_paused = true;
            previous
        };
        debug!(track_id = %track.id, generation, "Loading local media");

        let loaded = self.element.load(url, track.duration_ms).await;

        if self.load_generation.load(Ordering::SeqCst) != generation {
            debug!(track_id = %track.id, generation, "Load superseded");
            return Ok(());
        }

        if let Err(e) = loaded {
            // Keep reporting what was playing before
            *self.snapshot() = previous;
            warn!(track_id = %track.id, error = %e, "Local media load failed");
            return Err(e.into());
        }

        self.element.play().await.map_err(Into::into)
    }

    async fn play(&self) -> Result<()> {
        self.element.play().await.map_err(Into::into)
    }

    async fn pause(&self) -> Result<()> {
        self.element.pause().await.map_err(Into::into)
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.element.seek(position_ms).await.map_err(Into::into)
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.element.set_volume(volume).await.map_err(Into::into)
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.listeners.register(handler);
    }
}

impl std::fmt::Debug for LocalMediaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaAdapter")
            .field("listeners", &self.listeners)
            .field("load_generation", &self.load_generation)
            .finish_non_exhaustive()
    }
}
