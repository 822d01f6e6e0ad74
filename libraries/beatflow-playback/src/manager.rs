//! Playback manager - core state machine
//!
//! Owns the queue, the observable [`PlaybackState`] and the generation
//! counter used to discard stale load completions. It performs no I/O: every
//! method returns what the driver has to ask the adapter to do, and adapter
//! reports come back in through [`PlaybackManager::apply_adapter_event`].
//!
//! ```text
//! Idle -> Loading -> Playing <-> Paused -> Ended -> Loading (auto-advance)
//!            \           \          /
//!             +-----------+--> Error (until the next play)
//! ```

use crate::{
    adapter::{AdapterEvent, DeviceState},
    clock::ProgressClock,
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    queue::Queue,
    types::{CanonicalTrack, PlaybackConfig, PlaybackState, PlaybackStatus, RepeatMode},
    volume::Volume,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// A `load` the driver must hand to the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Generation tag; completions carrying an older tag are discarded
    pub generation: u64,
    pub track: CanonicalTrack,
}

/// Adapter call needed for a play/pause toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Pause,
    Resume,
}

/// What "previous" resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum PreviousAction {
    /// Seek the current track back to zero
    Restart,
    /// Load the previous queue entry
    Load(LoadRequest),
}

/// Central playback state machine
///
/// Orchestrates:
/// - Queue navigation (wraparound next/previous, repeat policy on natural end)
/// - Status transitions driven by adapter reports
/// - Generation tagging of loads
/// - Progress extrapolation between reports
/// - Volume clamping
pub struct PlaybackManager {
    state: PlaybackState,
    queue: Queue,
    volume: Volume,

    // Settings
    repeat: RepeatMode,
    optimistic_toggle: bool,
    restart_threshold_ms: u64,

    // Load tracking
    generation: u64,
    status_before_load: PlaybackStatus,
    /// The device has reported the track of the current generation
    load_confirmed: bool,

    clock: ProgressClock,
    adapter_ready: bool,

    // Event queue for UI synchronization
    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackManager {
    /// Create new playback manager
    pub fn new(config: &PlaybackConfig) -> Self {
        let volume = Volume::new(config.volume);
        Self {
            state: PlaybackState::new(volume.level()),
            queue: Queue::new(),
            volume,
            repeat: config.repeat,
            optimistic_toggle: config.optimistic_toggle,
            restart_threshold_ms: config.restart_threshold_ms,
            generation: 0,
            status_before_load: PlaybackStatus::Idle,
            load_confirmed: false,
            clock: ProgressClock::new(Instant::now()),
            adapter_ready: false,
            pending_events: Vec::new(),
        }
    }

    // ===== Accessors =====

    /// Current observable state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Current queue
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Generation of the most recent `play`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the adapter last reported readiness
    pub fn is_adapter_ready(&self) -> bool {
        self.adapter_ready
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    /// Take the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ===== Queue =====

    /// Replace the queue without starting playback
    pub fn set_queue(&mut self, tracks: Vec<CanonicalTrack>, start_index: usize) {
        self.queue.set_queue(tracks, start_index);
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
            cursor: self.queue.cursor(),
        });
    }

    /// Replace the queue and play the selected entry
    pub fn play_queue(
        &mut self,
        tracks: Vec<CanonicalTrack>,
        start_index: usize,
        now: Instant,
    ) -> Result<LoadRequest> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.set_queue(tracks, start_index);
        let track = self.queue.current().cloned().ok_or(PlaybackError::EmptyQueue)?;
        Ok(self.play(track, now))
    }

    /// Advance the queue (wrapping) and play the new entry
    pub fn next(&mut self, now: Instant) -> Result<LoadRequest> {
        let track = self.queue.advance()?;
        Ok(self.play(track, now))
    }

    /// Restart the current track, or retreat the queue (wrapping) and play
    pub fn previous(&mut self, now: Instant) -> Result<PreviousAction> {
        if self.state.status.is_active() && self.state.position_ms > self.restart_threshold_ms {
            return Ok(PreviousAction::Restart);
        }
        let track = self.queue.retreat()?;
        Ok(PreviousAction::Load(self.play(track, now)))
    }

    // ===== Commands =====

    /// Start loading `track`, valid from any status
    pub fn play(&mut self, track: CanonicalTrack, now: Instant) -> LoadRequest {
        self.generation += 1;
        self.load_confirmed = false;
        if self.state.status != PlaybackStatus::Loading {
            self.status_before_load = self.state.status;
        }
        debug!(track_id = %track.id, generation = self.generation, "Loading track");

        self.state.loading_track = Some(track.clone());
        self.state.error = None;
        self.set_status(PlaybackStatus::Loading, now);

        LoadRequest {
            generation: self.generation,
            track,
        }
    }

    /// Validate a play/pause toggle
    ///
    /// Only valid while playing or paused. Unless optimistic toggling is
    /// enabled, the status changes when the adapter confirms.
    pub fn toggle_play_pause(&mut self, now: Instant) -> Result<ToggleAction> {
        let action = match self.state.status {
            PlaybackStatus::Playing => ToggleAction::Pause,
            PlaybackStatus::Paused => ToggleAction::Resume,
            status => {
                return Err(PlaybackError::InvalidState {
                    operation: "toggle playback",
                    status,
                })
            }
        };

        if self.optimistic_toggle {
            self.set_status(toggled_status(action), now);
        }
        Ok(action)
    }

    /// Undo an optimistic toggle after the adapter refused it
    pub fn toggle_failed(&mut self, action: ToggleAction, err: &PlaybackError, now: Instant) {
        if self.optimistic_toggle && self.state.status == toggled_status(action) {
            let reverted = match action {
                ToggleAction::Pause => PlaybackStatus::Playing,
                ToggleAction::Resume => PlaybackStatus::Paused,
            };
            self.set_status(reverted, now);
        }
        self.command_failed(err, now);
    }

    /// Clamp and apply a seek, returning the position to send to the adapter
    ///
    /// Negative and past-the-end positions are clamped, never rejected.
    pub fn seek(&mut self, position_ms: i64, now: Instant) -> Result<u64> {
        let status = self.state.status;
        if matches!(status, PlaybackStatus::Idle | PlaybackStatus::Error) {
            return Err(PlaybackError::InvalidState {
                operation: "seek",
                status,
            });
        }

        let max = i64::try_from(self.state.duration_ms).unwrap_or(i64::MAX);
        let clamped = position_ms.clamp(0, max) as u64;

        self.state.position_ms = clamped;
        self.clock.sync(
            clamped,
            self.state.duration_ms,
            status == PlaybackStatus::Playing,
            now,
        );
        self.push_position();
        Ok(clamped)
    }

    /// Clamp and store a volume level, valid in any status
    pub fn set_volume(&mut self, level: f32) -> f32 {
        let level = self.volume.set_level(level);
        self.state.volume = level;
        self.pending_events
            .push(PlaybackEvent::VolumeChanged { level });
        level
    }

    /// Advance the local clock while playing
    pub fn tick(&mut self, now: Instant) {
        if self.state.status != PlaybackStatus::Playing {
            return;
        }
        let position = self.clock.position_at(now);
        if position != self.state.position_ms {
            self.state.position_ms = position;
            self.push_position();
        }
    }

    // ===== Adapter feedback =====

    /// Apply the result of a `load`
    ///
    /// Returns `false` when the completion was stale and discarded.
    pub fn complete_load(&mut self, generation: u64, result: Result<()>, now: Instant) -> bool {
        if generation != self.generation {
            warn!(
                generation,
                current = self.generation,
                "Discarding stale load completion"
            );
            return false;
        }

        match result {
            Ok(()) => debug!(generation, "Load accepted, waiting for device confirmation"),
            Err(_) if self.load_confirmed => {
                debug!(generation, "Ignoring load failure, device already confirmed");
            }
            Err(e) if self.state.status == PlaybackStatus::Error => {
                debug!(generation, error = %e, "Load failure already reported");
            }
            Err(PlaybackError::AdapterNotReady) => {
                info!("Adapter not ready, load refused");
                self.state.loading_track = None;
                let previous = self.status_before_load;
                self.set_status(previous, now);
                self.pending_events.push(PlaybackEvent::AdapterNotReady);
            }
            Err(e) => self.fail(&e, now),
        }
        true
    }

    /// Record a failed adapter call
    ///
    /// Transient errors are reported as events; anything else moves to `Error`.
    pub fn command_failed(&mut self, err: &PlaybackError, now: Instant) {
        if err.is_transient() {
            if matches!(err, PlaybackError::AdapterNotReady) {
                self.pending_events.push(PlaybackEvent::AdapterNotReady);
            }
        } else {
            self.fail(err, now);
        }
    }

    /// Report a failure to the UI without changing the status
    pub fn report_error(&mut self, err: &PlaybackError) {
        warn!(error = %err, "Adapter call failed");
        self.pending_events.push(PlaybackEvent::Error {
            message: err.to_string(),
        });
    }

    /// Reconcile an adapter event
    ///
    /// Returns a follow-up load when a natural end triggered auto-advance.
    pub fn apply_adapter_event(&mut self, event: AdapterEvent, now: Instant) -> Option<LoadRequest> {
        match event {
            AdapterEvent::Ready { device_id } => {
                info!(device_id = ?device_id, "Adapter ready");
                self.adapter_ready = true;
                self.pending_events
                    .push(PlaybackEvent::AdapterReady { device_id });
                None
            }
            AdapterEvent::NotReady { device_id } => {
                warn!(device_id = ?device_id, "Adapter went offline");
                self.adapter_ready = false;
                self.pending_events.push(PlaybackEvent::AdapterNotReady);
                None
            }
            AdapterEvent::Error { message } => {
                if matches!(
                    self.state.status,
                    PlaybackStatus::Loading | PlaybackStatus::Playing | PlaybackStatus::Paused
                ) {
                    self.fail(&PlaybackError::rejected(message), now);
                } else {
                    self.pending_events.push(PlaybackEvent::Error { message });
                }
                None
            }
            AdapterEvent::StateChanged(state) => self.apply_device_state(state, now),
        }
    }

    fn apply_device_state(&mut self, state: DeviceState, now: Instant) -> Option<LoadRequest> {
        let Some(reported) = state.track.as_ref() else {
            self.stop(now);
            return None;
        };

        match self.state.status {
            PlaybackStatus::Loading => {
                let target = self.state.loading_track.clone()?;
                if !target.is_same_track(reported) {
                    debug!(
                        reported = %reported.id,
                        target = %target.id,
                        "Ignoring state for a track other than the one loading"
                    );
                    return None;
                }
                self.state.loading_track = None;
                self.load_confirmed = true;
                self.confirm_track(target);
            }
            PlaybackStatus::Error => return None,
            _ => {
                let is_current = self
                    .state
                    .current_track
                    .as_ref()
                    .is_some_and(|current| current.is_same_track(reported));
                if !is_current {
                    info!(track_id = %reported.id, "Device switched track");
                    self.confirm_track(reported.clone());
                }
            }
        }

        self.state.position_ms = state.position_ms;
        if state.duration_ms > 0 {
            self.state.duration_ms = state.duration_ms;
        }
        self.push_position();

        if state.ended {
            return self.finish_track(now);
        }

        let status = if state.is_paused {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        };
        // A paused report right after the end keeps us in Ended
        if !(self.state.status == PlaybackStatus::Ended && state.is_paused) {
            self.set_status(status, now);
        }
        self.clock.sync(
            self.state.position_ms,
            self.state.duration_ms,
            self.state.status == PlaybackStatus::Playing,
            now,
        );
        None
    }

    // ===== Internal transitions =====

    fn finish_track(&mut self, now: Instant) -> Option<LoadRequest> {
        if self.state.status == PlaybackStatus::Ended {
            return None;
        }

        if let Some(track) = &self.state.current_track {
            info!(track_id = %track.id, "Track finished");
            self.pending_events.push(PlaybackEvent::TrackFinished {
                track_id: track.id.clone(),
            });
        }
        self.state.position_ms = self.state.duration_ms;
        self.set_status(PlaybackStatus::Ended, now);

        let next = match self.repeat {
            RepeatMode::One => self.state.current_track.clone(),
            RepeatMode::All => self.queue.advance().ok(),
            RepeatMode::Off if self.queue.is_at_end() => None,
            RepeatMode::Off => self.queue.advance().ok(),
        };

        next.map(|track| self.play(track, now))
    }

    fn stop(&mut self, now: Instant) {
        debug!("Device reports no track, stopping");
        let previous = self.state.current_track.take();
        self.state.loading_track = None;
        self.state.position_ms = 0;
        self.state.duration_ms = 0;
        self.clock.reset(now);

        if let Some(previous) = previous {
            self.pending_events.push(PlaybackEvent::TrackChanged {
                track_id: None,
                previous_track_id: Some(previous.id),
            });
        }
        self.set_status(PlaybackStatus::Idle, now);
    }

    fn confirm_track(&mut self, track: CanonicalTrack) {
        let previous_track_id = self.state.current_track.as_ref().map(|t| t.id.clone());
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id: Some(track.id.clone()),
            previous_track_id,
        });
        self.state.duration_ms = track.duration_ms;
        self.state.current_track = Some(track);
    }

    fn fail(&mut self, err: &PlaybackError, now: Instant) {
        error!(error = %err, "Playback failed");
        self.state.loading_track = None;
        self.state.error = Some(err.to_string());
        self.set_status(PlaybackStatus::Error, now);
        self.pending_events.push(PlaybackEvent::Error {
            message: err.to_string(),
        });
    }

    fn set_status(&mut self, status: PlaybackStatus, now: Instant) {
        if self.state.status != status {
            self.state.status = status;
            self.pending_events
                .push(PlaybackEvent::StateChanged { status });
        }
        self.clock
            .set_running(status == PlaybackStatus::Playing, now);
    }

    fn push_position(&mut self) {
        self.pending_events.push(PlaybackEvent::PositionUpdate {
            position_ms: self.state.position_ms,
            duration_ms: self.state.duration_ms,
        });
    }
}

impl Default for PlaybackManager {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

fn toggled_status(action: ToggleAction) -> PlaybackStatus {
    match action {
        ToggleAction::Pause => PlaybackStatus::Paused,
        ToggleAction::Resume => PlaybackStatus::Playing,
    }
}
