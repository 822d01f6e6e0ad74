//! Media element seam
//!
//! [`MediaElement`] is the narrow surface the local adapter drives, shaped
//! like an HTML audio element: load a source, play, pause, seek, and report
//! progress through [`ElementEvent`]s.
//!
//! [`HeadlessMediaElement`] fetches the resource over HTTP and runs a
//! software clock in place of an audio output:
//!
//! ```text
//! load(url) ──GET──> LoadedMetadata
//! play()    ──────> Playing, TimeUpdate every 250ms ... TimeUpdate(duration), Ended
//! pause()   ──────> Paused
//! ```

use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use beatflow_playback::clamp_volume;
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Default spacing of `TimeUpdate` events
pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Events reported by a media element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    /// Source is ready and its duration known
    LoadedMetadata { duration_ms: u64 },
    /// Playhead moved
    TimeUpdate { position_ms: u64 },
    Playing,
    Paused,
    /// Playhead reached the end of the source
    Ended,
    Error { message: String },
}

/// Listener registered through [`MediaElement::subscribe`]
pub type ElementListener = Arc<dyn Fn(ElementEvent) + Send + Sync>;

/// Something that plays a direct media URL
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Replace the source. `duration_hint_ms` is used when the element cannot
    /// probe the duration itself.
    async fn load(&self, url: &str, duration_hint_ms: u64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Volume in [0, 1]
    async fn set_volume(&self, volume: f32) -> Result<()>;

    fn position_ms(&self) -> u64;

    fn subscribe(&self, listener: ElementListener);
}

#[derive(Debug)]
struct Playhead {
    source: Option<String>,
    duration_ms: u64,
    /// Position when the clock last (re)started
    base_ms: u64,
    /// Set while playing
    started_at: Option<Instant>,
    volume: f32,
    /// Bumped by every `load`; only the newest one may replace the source
    load_epoch: u64,
}

impl Playhead {
    fn position_at(&self, now: Instant) -> u64 {
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start).as_millis() as u64)
            .unwrap_or(0);
        let position = self.base_ms.saturating_add(elapsed);
        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    fn is_at_end(&self, now: Instant) -> bool {
        self.duration_ms > 0 && self.position_at(now) >= self.duration_ms
    }
}

struct Shared {
    playhead: Mutex<Playhead>,
    listeners: Mutex<Vec<ElementListener>>,
}

impl Shared {
    fn playhead(&self) -> MutexGuard<'_, Playhead> {
        self.playhead.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ElementEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

/// Media element without audio output
///
/// Fetches the whole resource on `load` (so unreachable or missing media
/// fails the load, as it would in a browser) and advances a software
/// playhead while playing.
pub struct HeadlessMediaElement {
    http: Client,
    shared: Arc<Shared>,
    clock: Mutex<Option<JoinHandle<()>>>,
    time_update_interval: Duration,
}

impl HeadlessMediaElement {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("BeatFlow/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, TIME_UPDATE_INTERVAL))
    }

    /// Element using `http` and emitting time updates every `time_update_interval`
    pub fn with_client(http: Client, time_update_interval: Duration) -> Self {
        Self {
            http,
            shared: Arc::new(Shared {
                playhead: Mutex::new(Playhead {
                    source: None,
                    duration_ms: 0,
                    base_ms: 0,
                    started_at: None,
                    volume: 1.0,
                    load_epoch: 0,
                }),
                listeners: Mutex::new(Vec::new()),
            }),
            clock: Mutex::new(None),
            time_update_interval,
        }
    }

    pub fn volume(&self) -> f32 {
        self.shared.playhead().volume
    }

    pub fn source(&self) -> Option<String> {
        self.shared.playhead().source.clone()
    }

    fn start_clock(&self) {
        let shared = Arc::clone(&self.shared);
        let every = self.time_update_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let (position_ms, ended) = {
                    let mut playhead = shared.playhead();
                    let now = Instant::now();
                    let position = playhead.position_at(now);
                    let ended = playhead.is_at_end(now);
                    if ended {
                        playhead.base_ms = playhead.duration_ms;
                        playhead.started_at = None;
                    }
                    (position, ended)
                };

                shared.emit(ElementEvent::TimeUpdate { position_ms });
                if ended {
                    debug!(position_ms, "Media ended");
                    shared.emit(ElementEvent::Ended);
                    break;
                }
            }
        });

        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = clock.replace(handle) {
            previous.abort();
        }
    }

    /// GET the whole resource, returning its size
    async fn fetch(&self, url: &str) -> Result<usize> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::HttpStatus(status.as_u16()));
        }
        Ok(response.bytes().await?.len())
    }

    fn stop_clock(&self) {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = clock.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl MediaElement for HeadlessMediaElement {
    async fn load(&self, url: &str, duration_hint_ms: u64) -> Result<()> {
        self.stop_clock();
        let epoch = {
            let mut playhead = self.shared.playhead();
            playhead.load_epoch += 1;
            playhead.load_epoch
        };
        debug!(url = %url, epoch, "Fetching media");

        let fetched = self.fetch(url).await;

        let mut playhead = self.shared.playhead();
        if playhead.load_epoch != epoch {
            debug!(url = %url, epoch, "Media load superseded");
            return Err(DeviceError::Superseded);
        }

        match fetched {
            Ok(bytes) => {
                debug!(url = %url, bytes, "Media fetched");
                playhead.source = Some(url.to_string());
                playhead.duration_ms = duration_hint_ms;
                playhead.base_ms = 0;
                playhead.started_at = None;
                drop(playhead);

                self.shared.emit(ElementEvent::LoadedMetadata {
                    duration_ms: duration_hint_ms,
                });
                Ok(())
            }
            Err(error) => {
                drop(playhead);
                if let DeviceError::HttpStatus(_) = error {
                    self.shared.emit(ElementEvent::Error {
                        message: error.to_string(),
                    });
                }
                Err(error)
            }
        }
    }

    async fn play(&self) -> Result<()> {
        {
            let mut playhead = self.shared.playhead();
            if playhead.source.is_none() {
                return Err(DeviceError::NoMedia);
            }
            let now = Instant::now();
            // Playing an ended source starts over
            if playhead.is_at_end(now) {
                playhead.base_ms = 0;
            }
            if playhead.started_at.is_none() {
                playhead.started_at = Some(now);
            }
        }
        self.start_clock();
        self.shared.emit(ElementEvent::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.stop_clock();
        {
            let mut playhead = self.shared.playhead();
            if playhead.source.is_none() {
                return Err(DeviceError::NoMedia);
            }
            playhead.base_ms = playhead.position_at(Instant::now());
            playhead.started_at = None;
        }
        self.shared.emit(ElementEvent::Paused);
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        let position_ms = {
            let mut playhead = self.shared.playhead();
            if playhead.source.is_none() {
                return Err(DeviceError::NoMedia);
            }
            let target = if playhead.duration_ms > 0 {
                position_ms.min(playhead.duration_ms)
            } else {
                position_ms
            };
            playhead.base_ms = target;
            if playhead.started_at.is_some() {
                playhead.started_at = Some(Instant::now());
            }
            target
        };
        self.shared.emit(ElementEvent::TimeUpdate { position_ms });
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        let level = clamp_volume(volume);
        if (level - volume).abs() > f32::EPSILON {
            warn!(requested = volume, applied = level, "Volume clamped");
        }
        self.shared.playhead().volume = level;
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.shared.playhead().position_at(Instant::now())
    }

    fn subscribe(&self, listener: ElementListener) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

impl Drop for HeadlessMediaElement {
    fn drop(&mut self) {
        self.stop_clock();
    }
}

impl std::fmt::Debug for HeadlessMediaElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessMediaElement")
            .field("playhead", &*self.shared.playhead())
            .field("time_update_interval", &self.time_update_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playhead(duration_ms: u64) -> Playhead {
        Playhead {
            source: Some("https://cdn.example.com/a.mp4".into()),
            duration_ms,
            base_ms: 0,
            started_at: None,
            volume: 1.0,
            load_epoch: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_playhead_advances_only_while_started() {
        let mut head = playhead(10_000);
        let start = Instant::now();
        assert_eq!(head.position_at(start + Duration::from_secs(3)), 0);

        head.started_at = Some(start);
        assert_eq!(head.position_at(start + Duration::from_secs(3)), 3_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playhead_stops_at_duration() {
        let mut head = playhead(10_000);
        let start = Instant::now();
        head.base_ms = 9_000;
        head.started_at = Some(start);

        let later = start + Duration::from_secs(5);
        assert_eq!(head.position_at(later), 10_000);
        assert!(head.is_at_end(later));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_duration_never_ends() {
        let mut head = playhead(0);
        let start = Instant::now();
        head.started_at = Some(start);

        let later = start + Duration::from_secs(600);
        assert_eq!(head.position_at(later), 600_000);
        assert!(!head.is_at_end(later));
    }

    #[tokio::test]
    async fn test_commands_need_a_source() {
        let element = HeadlessMediaElement::with_client(Client::new(), TIME_UPDATE_INTERVAL);
        assert!(matches!(element.play().await, Err(DeviceError::NoMedia)));
        assert!(matches!(element.seek(1_000).await, Err(DeviceError::NoMedia)));
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let element = HeadlessMediaElement::with_client(Client::new(), TIME_UPDATE_INTERVAL);
        element.set_volume(1.7).await.unwrap();
        assert_eq!(element.volume(), 1.0);
    }
}
