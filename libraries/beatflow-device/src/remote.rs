//! Remote device adapter
//!
//! Controls a vendor playback device through the Web API. The device must be
//! discovered with [`RemoteDeviceAdapter::connect`] before any command is
//! accepted; until then every call fails with `AdapterNotReady` and nothing
//! is queued.
//!
//! Device state is polled. Consecutive identical reports are collapsed, and
//! a natural end is inferred from the vendor's behavior of parking a
//! finished track paused at position 0.

use crate::error::{DeviceError, Result as DeviceResult};
use crate::sdk_hook::{Registration, SdkHook};
use async_trait::async_trait;
use beatflow_client::{ClientError, CurrentPlayback, DevicePlayerClient};
use beatflow_playback::{
    to_percent, AdapterEvent, CanonicalTrack, Capabilities, DeviceState, MediaRef,
    PlaybackAdapter, PlaybackError, Result, StateHandler, StateListeners,
};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Name the web player registers under
pub const DEFAULT_DEVICE_NAME: &str = "BeatFlow Web Player";

/// Remote device settings
#[derive(Debug, Clone)]
pub struct RemoteDeviceConfig {
    /// Device to control (default: "BeatFlow Web Player")
    pub device_name: String,

    /// State polling interval (default: 1s)
    pub poll_interval: Duration,

    /// A track reported within this window of its end counts as "near the end"
    /// for natural-end detection (default: 3s)
    pub end_window: Duration,
}

impl Default for RemoteDeviceConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            poll_interval: Duration::from_millis(1000),
            end_window: Duration::from_secs(3),
        }
    }
}

/// Adapter for a vendor playback device
pub struct RemoteDeviceAdapter {
    api: DevicePlayerClient,
    config: RemoteDeviceConfig,
    listeners: StateListeners,
    device_id: RwLock<Option<String>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteDeviceAdapter {
    pub fn new(api: DevicePlayerClient, config: RemoteDeviceConfig) -> Self {
        Self {
            api,
            config,
            listeners: StateListeners::new(),
            device_id: RwLock::new(None),
            poller: Mutex::new(None),
        }
    }

    /// Discover the device by name and start polling its state
    ///
    /// Emits `Ready` with the device id on success.
    pub async fn connect(&self) -> DeviceResult<String> {
        let name = &self.config.device_name;
        debug!(device_name = %name, "Looking for playback device");

        let device_id = self
            .api
            .find_device(name)
            .await?
            .and_then(|device| device.id)
            .ok_or_else(|| DeviceError::DeviceNotFound(name.clone()))?;

        if let Ok(mut slot) = self.device_id.write() {
            *slot = Some(device_id.clone());
        }
        self.start_polling();

        info!(device_id = %device_id, device_name = %name, "Playback device ready");
        self.listeners.emit(AdapterEvent::Ready {
            device_id: Some(device_id.clone()),
        });
        Ok(device_id)
    }

    /// Forget the device and stop polling
    pub fn disconnect(&self) {
        self.stop_polling();
        let previous = self.device_id.write().ok().and_then(|mut slot| slot.take());
        if previous.is_some() {
            info!(device_id = ?previous, "Playback device disconnected");
            self.listeners
                .emit(AdapterEvent::NotReady { device_id: previous });
        }
    }

    /// Connect once the vendor SDK reports it is loaded
    ///
    /// The connection runs on the runtime this is called from.
    pub fn attach_to(self: &Arc<Self>, hook: &SdkHook) -> Registration {
        let adapter = Arc::clone(self);
        let runtime = tokio::runtime::Handle::try_current().ok();

        hook.register(move || {
            let Some(runtime) = runtime else {
                warn!("No tokio runtime to connect the playback device on");
                return;
            };
            runtime.spawn(async move {
                if let Err(e) = adapter.connect().await {
                    warn!(error = %e, "Could not connect to playback device");
                    adapter.listeners.emit(AdapterEvent::Error {
                        message: e.to_string(),
                    });
                }
            });
        })
    }

    pub fn device_id(&self) -> Option<String> {
        self.device_id.read().ok().and_then(|id| id.clone())
    }

    fn require_device(&self) -> Result<String> {
        self.device_id().ok_or(PlaybackError::AdapterNotReady)
    }

    fn start_polling(&self) {
        let api = self.api.clone();
        let listeners = self.listeners.clone();
        let every = self.config.poll_interval;
        let end_window_ms = self.config.end_window.as_millis() as u64;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut detector = EndDetector::new(end_window_ms);
            let mut last_state: Option<DeviceState> = None;
            let mut last_error: Option<String> = None;

            loop {
                ticker.tick().await;

                match api.current_playback().await {
                    Ok(playback) => {
                        last_error = None;
                        let Some(state) = detector.observe(playback.as_ref()) else {
                            continue;
                        };
                        if last_state.as_ref() != Some(&state) {
                            listeners.emit(AdapterEvent::StateChanged(state.clone()));
                            last_state = Some(state);
                        }
                    }
                    Err(ClientError::PlaybackRejected(message)) => {
                        // Account-level refusal, reported once
                        if last_error.as_deref() != Some(message.as_str()) {
                            warn!(message = %message, "Device reported an account error");
                            listeners.emit(AdapterEvent::Error {
                                message: message.clone(),
                            });
                            last_error = Some(message);
                        }
                    }
                    Err(
                        e @ (ClientError::AuthRequired
                        | ClientError::AuthFailed(_)
                        | ClientError::TokenRefreshFailed(_)),
                    ) => {
                        let message = PlaybackError::from(e).to_string();
                        if last_error.as_deref() != Some(message.as_str()) {
                            warn!("Device rejected the access token");
                            listeners.emit(AdapterEvent::Error {
                                message: message.clone(),
                            });
                            last_error = Some(message);
                        }
                    }
                    Err(e) => warn!(error = %e, "Polling device state failed"),
                }
            }
        });

        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = poller.replace(handle) {
            previous.abort();
        }
    }

    fn stop_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl PlaybackAdapter for RemoteDeviceAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direct_urls: false,
            opaque_uris: true,
        }
    }

    fn is_ready(&self) -> bool {
        self.device_id().is_some()
    }

    async fn load(&self, track: &CanonicalTrack) -> Result<()> {
        let device_id = self.require_device()?;
        let MediaRef::Uri(uri) = &track.media_ref else {
            return Err(PlaybackError::rejected(
                "remote device cannot play direct media URLs",
            ));
        };

        debug!(track_id = %track.id, device_id = %device_id, "Starting track on device");
        self.api
            .start_playback(&device_id, std::slice::from_ref(uri), None)
            .await
            .map_err(Into::into)
    }

    async fn play(&self) -> Result<()> {
        let device_id = self.require_device()?;
        self.api.resume(&device_id).await.map_err(Into::into)
    }

    async fn pause(&self) -> Result<()> {
        let device_id = self.require_device()?;
        self.api.pause(&device_id).await.map_err(Into::into)
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        let device_id = self.require_device()?;
        self.api.seek(&device_id, position_ms).await.map_err(Into::into)
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        let device_id = self.require_device()?;
        self.api
            .set_volume(&device_id, to_percent(volume))
            .await
            .map_err(Into::into)
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.listeners.register(handler);
    }
}

impl Drop for RemoteDeviceAdapter {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl std::fmt::Debug for RemoteDeviceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDeviceAdapter")
            .field("config", &self.config)
            .field("device_id", &self.device_id())
            .finish_non_exhaustive()
    }
}

/// Turns polled snapshots into device states, inferring natural ends
#[derive(Debug)]
struct EndDetector {
    end_window_ms: u64,
    /// Track last seen playing within the end window
    near_end: Option<String>,
}

impl EndDetector {
    fn new(end_window_ms: u64) -> Self {
        Self {
            end_window_ms,
            near_end: None,
        }
    }

    /// `None` when the snapshot carries nothing worth reporting
    /// (e.g. an ad or an unplayable item)
    fn observe(&mut self, playback: Option<&CurrentPlayback>) -> Option<DeviceState> {
        let Some(playback) = playback else {
            self.near_end = None;
            return Some(DeviceState::stopped());
        };
        let track = playback.track()?;

        let duration_ms = track.duration_ms;
        let position_ms = playback.progress_ms.unwrap_or(0);
        let is_paused = !playback.is_playing;

        let was_near_end = self.near_end.as_deref() == Some(track.id.as_str());
        let parked = is_paused && (position_ms == 0 || (duration_ms > 0 && position_ms >= duration_ms));

        if was_near_end && parked {
            self.near_end = None;
            debug!(track_id = %track.id, "Natural end detected");
            return Some(DeviceState {
                position_ms: duration_ms,
                duration_ms,
                is_paused: true,
                ended: true,
                track: Some(track),
            });
        }

        let near_end = duration_ms > 0 && position_ms.saturating_add(self.end_window_ms) >= duration_ms;
        self.near_end = near_end.then(|| track.id.clone());

        Some(DeviceState {
            position_ms,
            duration_ms,
            is_paused,
            ended: false,
            track: Some(track),
        })
    }
}
