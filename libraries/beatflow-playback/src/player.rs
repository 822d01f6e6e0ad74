//! Async player driver
//!
//! A single tokio task owns the [`PlaybackManager`] and serializes everything
//! that touches it: commands from [`PlayerHandle`]s, adapter events, load
//! completions and the progress ticker. Loads run in their own tasks so a
//! slow `load` never blocks a superseding `play`.

use crate::{
    adapter::{AdapterEvent, PlaybackAdapter},
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    manager::{LoadRequest, PlaybackManager, PreviousAction, ToggleAction},
    resolver,
    types::{CanonicalTrack, PlaybackConfig, PlaybackState, RepeatMode},
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Play {
        track: CanonicalTrack,
        reply: Reply<()>,
    },
    PlayQueue {
        tracks: Vec<CanonicalTrack>,
        start_index: usize,
        reply: Reply<()>,
    },
    SetQueue {
        tracks: Vec<CanonicalTrack>,
        start_index: usize,
        reply: Reply<()>,
    },
    TogglePlayPause {
        reply: Reply<()>,
    },
    Next {
        reply: Reply<()>,
    },
    Previous {
        reply: Reply<()>,
    },
    Seek {
        position_ms: i64,
        reply: Reply<u64>,
    },
    SetVolume {
        level: f32,
        reply: Reply<f32>,
    },
    SetRepeat {
        repeat: RepeatMode,
        reply: Reply<()>,
    },
    Shutdown,
}

struct LoadCompletion {
    generation: u64,
    result: Result<()>,
    reply: Option<Reply<()>>,
}

/// Entry point for running a player
pub struct Player;

impl Player {
    /// Spawn the driver task for `adapter`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(adapter: Arc<dyn PlaybackAdapter>, config: PlaybackConfig) -> PlayerHandle {
        let manager = PlaybackManager::new(&config);
        let (state_tx, state_rx) = watch::channel(manager.state().clone());
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (adapter_tx, adapter_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let handler_tx = adapter_tx.clone();
        adapter.on_state_change(Arc::new(move |event: AdapterEvent| {
            // Receiver is gone once the player shut down
            let _ = handler_tx.send(event);
        }));
        // Adapters that were ready before we subscribed never announce it
        if adapter.is_ready() {
            let _ = adapter_tx.send(AdapterEvent::Ready { device_id: None });
        }

        let task = PlayerTask {
            manager,
            adapter,
            config,
            state_tx,
            events_tx: events_tx.clone(),
            completions_tx,
        };
        tokio::spawn(task.run(commands_rx, adapter_rx, completions_rx));
        info!("Player started");

        PlayerHandle {
            commands: commands_tx,
            state: state_rx,
            events: events_tx,
        }
    }
}

struct PlayerTask {
    manager: PlaybackManager,
    adapter: Arc<dyn PlaybackAdapter>,
    config: PlaybackConfig,
    state_tx: watch::Sender<PlaybackState>,
    events_tx: broadcast::Sender<PlaybackEvent>,
    completions_tx: mpsc::UnboundedSender<LoadCompletion>,
}

impl PlayerTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut adapter_events: mpsc::UnboundedReceiver<AdapterEvent>,
        mut completions: mpsc::UnboundedReceiver<LoadCompletion>,
    ) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = adapter_events.recv() => {
                    if let Some(request) = self.manager.apply_adapter_event(event, Instant::now()) {
                        info!(track_id = %request.track.id, "Auto-advancing");
                        self.dispatch_load(request, None);
                    }
                }
                Some(done) = completions.recv() => self.handle_completion(done),
                _ = ticker.tick() => self.manager.tick(Instant::now()),
            }
            self.publish();
        }

        info!("Player stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Play { track, reply } => {
                let request = self.manager.play(track, now);
                self.dispatch_load(request, Some(reply));
            }
            Command::PlayQueue {
                tracks,
                start_index,
                reply,
            } => match self.manager.play_queue(tracks, start_index, now) {
                Ok(request) => self.dispatch_load(request, Some(reply)),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::SetQueue {
                tracks,
                start_index,
                reply,
            } => {
                self.manager.set_queue(tracks, start_index);
                let _ = reply.send(Ok(()));
            }
            Command::Next { reply } => match self.manager.next(now) {
                Ok(request) => self.dispatch_load(request, Some(reply)),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Previous { reply } => match self.manager.previous(now) {
                Ok(PreviousAction::Load(request)) => self.dispatch_load(request, Some(reply)),
                Ok(PreviousAction::Restart) => {
                    let result = self.restart().await;
                    let _ = reply.send(result);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::TogglePlayPause { reply } => {
                let result = self.toggle().await;
                let _ = reply.send(result);
            }
            Command::Seek { position_ms, reply } => {
                let result = self.seek(position_ms).await;
                let _ = reply.send(result);
            }
            Command::SetVolume { level, reply } => {
                let level = self.manager.set_volume(level);
                self.publish();
                let result = self
                    .call("set volume", self.adapter.set_volume(level))
                    .await;
                if let Err(e) = &result {
                    self.manager.report_error(e);
                }
                let _ = reply.send(result.map(|()| level));
            }
            Command::SetRepeat { repeat, reply } => {
                debug!(repeat = ?repeat, "Repeat mode changed");
                self.manager.set_repeat(repeat);
                let _ = reply.send(Ok(()));
            }
            // Handled by the run loop
            Command::Shutdown => {}
        }
    }

    async fn toggle(&mut self) -> Result<()> {
        let action = self.manager.toggle_play_pause(Instant::now())?;
        self.publish();

        let result = match action {
            ToggleAction::Pause => self.call("pause", self.adapter.pause()).await,
            ToggleAction::Resume => self.call("play", self.adapter.play()).await,
        };
        if let Err(e) = &result {
            self.manager.toggle_failed(action, e, Instant::now());
        }
        result
    }

    async fn seek(&mut self, position_ms: i64) -> Result<u64> {
        let position = self.manager.seek(position_ms, Instant::now())?;
        self.publish();

        let result = self.call("seek", self.adapter.seek(position)).await;
        if let Err(e) = &result {
            self.manager.command_failed(e, Instant::now());
        }
        result.map(|()| position)
    }

    async fn restart(&mut self) -> Result<()> {
        debug!("Restarting current track");
        self.seek(0).await.map(|_| ())
    }

    /// Run an adapter control call under the command timeout
    async fn call<F>(&self, operation: &'static str, call: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let limit = self.config.command_timeout;
        timeout(limit, call)
            .await
            .unwrap_or(Err(PlaybackError::Timeout {
                operation,
                timeout: limit,
            }))
    }

    fn dispatch_load(&self, request: LoadRequest, reply: Option<Reply<()>>) {
        let LoadRequest { generation, track } = request;

        if !self.adapter.capabilities().can_play(&track.media_ref) {
            let _ = self.completions_tx.send(LoadCompletion {
                generation,
                result: Err(PlaybackError::rejected(format!(
                    "this player cannot play {}",
                    track.media_ref.as_str()
                ))),
                reply,
            });
            return;
        }

        let adapter = Arc::clone(&self.adapter);
        let completions = self.completions_tx.clone();
        let limit = self.config.load_timeout;

        tokio::spawn(async move {
            let result = timeout(limit, adapter.load(&track))
                .await
                .unwrap_or(Err(PlaybackError::Timeout {
                    operation: "load",
                    timeout: limit,
                }));
            let _ = completions.send(LoadCompletion {
                generation,
                result,
                reply,
            });
        });
    }

    fn handle_completion(&mut self, done: LoadCompletion) {
        let LoadCompletion {
            generation,
            result,
            reply,
        } = done;

        let applied = self
            .manager
            .complete_load(generation, result.clone(), Instant::now());

        if let Some(reply) = reply {
            // A superseded load is not the caller's failure
            let _ = reply.send(if applied { result } else { Ok(()) });
        }
    }

    fn publish(&mut self) {
        for event in self.manager.drain_events() {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }

        let state = self.manager.state();
        self.state_tx.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }
}

/// Cloneable handle to a running player
///
/// Every method fails with [`PlaybackError::PlayerClosed`] once the player
/// has shut down.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PlaybackState>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlayerHandle {
    /// Play a track
    ///
    /// Resolves once the adapter accepted or refused the load. A load that
    /// was superseded by a later `play` resolves `Ok`.
    pub async fn play(&self, track: CanonicalTrack) -> Result<()> {
        self.request(|reply| Command::Play { track, reply }).await
    }

    /// Resolve a raw provider payload and play it
    pub async fn play_raw(&self, raw: &serde_json::Value) -> Result<()> {
        let track = resolver::resolve_value(raw)?;
        self.play(track).await
    }

    /// Replace the queue and play the entry at `start_index`
    pub async fn play_queue(&self, tracks: Vec<CanonicalTrack>, start_index: usize) -> Result<()> {
        self.request(|reply| Command::PlayQueue {
            tracks,
            start_index,
            reply,
        })
        .await
    }

    /// Replace the queue without starting playback
    pub async fn set_queue(&self, tracks: Vec<CanonicalTrack>, start_index: usize) -> Result<()> {
        self.request(|reply| Command::SetQueue {
            tracks,
            start_index,
            reply,
        })
        .await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(|reply| Command::TogglePlayPause { reply }).await
    }

    /// Skip to the next queue entry (wrapping)
    pub async fn next(&self) -> Result<()> {
        self.request(|reply| Command::Next { reply }).await
    }

    /// Restart the current track or go back one entry (wrapping)
    pub async fn previous(&self) -> Result<()> {
        self.request(|reply| Command::Previous { reply }).await
    }

    /// Seek, returning the clamped position that was applied
    pub async fn seek(&self, position_ms: i64) -> Result<u64> {
        self.request(|reply| Command::Seek { position_ms, reply })
            .await
    }

    /// Set volume, returning the clamped level that was applied
    pub async fn set_volume(&self, level: f32) -> Result<f32> {
        self.request(|reply| Command::SetVolume { level, reply })
            .await
    }

    pub async fn set_repeat(&self, repeat: RepeatMode) -> Result<()> {
        self.request(|reply| Command::SetRepeat { repeat, reply })
            .await
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Watch the full state
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Receive playback events
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stop the driver task
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| PlaybackError::PlayerClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| PlaybackError::PlayerClosed)?;
        rx.await.map_err(|_| PlaybackError::PlayerClosed)?
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}
