/// BeatFlow - command-line player
use anyhow::Context;
use beatflow_cli::{reports_expired_credential, BeatFlowConfig, CliError};
use beatflow_client::{
    parse_redirect, BeatFlowClient, CredentialManager, FileCredentialStore, TokenProvider,
    TokenRefresher,
};
use beatflow_device::{build_adapter, AdapterKind, SdkHook};
use beatflow_playback::{
    CanonicalTrack, PlaybackError, PlaybackEvent, PlaybackStatus, Player, PlayerHandle,
    RepeatMode,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for a remote device to come online
const DEVICE_READY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "beatflow")]
#[command(about = "BeatFlow music player", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "BEATFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog for songs
    Search {
        /// Search terms
        query: String,
    },
    /// List new album releases
    Home,
    /// Play a song, album or playlist
    Play {
        #[command(subcommand)]
        target: PlayTarget,

        /// Override the configured repeat mode (off, all, one)
        #[arg(short, long)]
        repeat: Option<String>,
    },
    /// List playback devices on the vendor account
    Devices,
    /// Store vendor tokens from the authorization redirect URL
    Login {
        /// Full redirect URL including the token query parameters
        redirect_url: String,
    },
    /// Forget stored vendor tokens
    Logout,
}

#[derive(Subcommand)]
enum PlayTarget {
    /// A single song by ID
    Song { id: String },
    /// Every track of an album
    Album { id: String },
    /// Every track of a playlist
    Playlist { id: String },
    /// The results of a catalog search
    Search { query: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "beatflow=info,beatflow_playback=info,beatflow_client=info,beatflow_device=info"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = BeatFlowConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let client = BeatFlowClient::new(config.client_config())?;

    match cli.command {
        Commands::Search { query } => search(&client, &query).await?,
        Commands::Home => home(&client).await?,
        Commands::Play { target, repeat } => {
            let repeat = repeat.as_deref().map(parse_repeat).transpose()?;
            play(&client, &config, target, repeat).await?;
        }
        Commands::Devices => devices(&client, &config).await?,
        Commands::Login { redirect_url } => login(&client, &config, &redirect_url).await?,
        Commands::Logout => logout(&client, &config).await?,
    }

    Ok(())
}

async fn search(client: &BeatFlowClient, query: &str) -> anyhow::Result<()> {
    let catalog = client.catalog().await;
    let tracks = catalog.client().search(query).await?;

    if tracks.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }

    for track in &tracks {
        print_track(track);
    }
    Ok(())
}

async fn home(client: &BeatFlowClient) -> anyhow::Result<()> {
    let catalog = client.catalog().await;
    for album in catalog.client().home().await? {
        println!("{}  {} - {}", album.id, album.name, album.artist_display());
    }
    Ok(())
}

async fn play(
    client: &BeatFlowClient,
    config: &BeatFlowConfig,
    target: PlayTarget,
    repeat: Option<RepeatMode>,
) -> anyhow::Result<()> {
    let mut tracks = resolve_target(client, target).await?;

    let credentials = credential_manager(client, config).await;
    if config.player.adapter == AdapterKind::RemoteDevice {
        restore_credentials(&credentials, config).await?;
    }

    let hook = SdkHook::global();
    let tokens: Arc<dyn TokenProvider> = Arc::new(credentials.clone());
    let adapter = build_adapter(&config.adapter_options(), tokens, hook)?;

    let capabilities = adapter.capabilities();
    let total = tracks.len();
    tracks.retain(|track| capabilities.can_play(&track.media_ref));
    if tracks.len() < total {
        tracing::warn!(
            skipped = total - tracks.len(),
            "Skipping tracks the configured adapter cannot play"
        );
    }
    if tracks.is_empty() {
        return Err(CliError::NothingToPlay(format!(
            "none of {} tracks can be played by the {:?} adapter",
            total, config.player.adapter
        ))
        .into());
    }

    let mut playback = config.playback_config();
    if let Some(repeat) = repeat {
        playback.repeat = repeat;
    }
    let stop_at_end = playback.repeat == RepeatMode::Off;

    let player = Player::spawn(adapter, playback);
    let mut events = player.events();

    // The vendor SDK is usable once credentials are in place
    hook.mark_loaded();
    if config.player.adapter == AdapterKind::RemoteDevice {
        wait_for_device(&mut events).await?;
    }

    tracing::info!(tracks = tracks.len(), "Starting playback");
    let outcome = match player.play_queue(tracks, 0).await {
        Ok(()) => follow(&player, &mut events, &credentials, stop_at_end).await,
        Err(PlaybackError::CredentialExpired) => {
            expire_session(&credentials).await;
            Err(PlaybackError::CredentialExpired.into())
        }
        Err(e) => Err(e.into()),
    };

    player.shutdown().await?;
    outcome
}

async fn resolve_target(
    client: &BeatFlowClient,
    target: PlayTarget,
) -> anyhow::Result<Vec<CanonicalTrack>> {
    let catalog = client.catalog().await;
    let catalog = catalog.client();

    let tracks = match target {
        PlayTarget::Song { id } => vec![catalog.song(&id).await?],
        PlayTarget::Album { id } => {
            let album = catalog.album(&id).await?;
            println!("{} - {}", album.summary.name, album.summary.artist_display());
            album.tracks
        }
        PlayTarget::Playlist { id } => {
            let playlist = catalog.playlist(&id).await?;
            println!("{}", playlist.name);
            if let Some(description) = &playlist.description {
                println!("{}", description);
            }
            playlist.tracks
        }
        PlayTarget::Search { query } => catalog.search(&query).await?,
    };

    if tracks.is_empty() {
        return Err(CliError::NothingToPlay("no tracks found".to_string()).into());
    }
    Ok(tracks)
}

async fn wait_for_device(
    events: &mut tokio::sync::broadcast::Receiver<PlaybackEvent>,
) -> anyhow::Result<()> {
    let ready = async {
        loop {
            match events.recv().await {
                Ok(PlaybackEvent::AdapterReady { device_id }) => return Some(device_id),
                Ok(PlaybackEvent::Error { message }) => {
                    tracing::warn!(%message, "Device error while connecting");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    };

    match tokio::time::timeout(DEVICE_READY_TIMEOUT, ready).await {
        Ok(Some(device_id)) => {
            tracing::info!(device_id = ?device_id, "Playback device ready");
            Ok(())
        }
        Ok(None) => Err(anyhow::anyhow!("player stopped before the device was ready")),
        Err(_) => Err(CliError::Timeout("the playback device").into()),
    }
}

/// Print track changes until the queue finishes or Ctrl-C
///
/// Stops with [`CliError::SessionExpired`] once a rejected token has ended
/// the user session.
async fn follow(
    player: &PlayerHandle,
    events: &mut tokio::sync::broadcast::Receiver<PlaybackEvent>,
    credentials: &CredentialManager,
    stop_at_end: bool,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            event = events.recv() => match event {
                Ok(PlaybackEvent::TrackChanged { track_id: Some(_), .. }) => {
                    if let Some(track) = player.state().current_track {
                        print!("Now playing: ");
                        print_track(&track);
                    }
                }
                Ok(PlaybackEvent::StateChanged { status: PlaybackStatus::Ended }) if stop_at_end => {
                    let state = player.state();
                    if state.status == PlaybackStatus::Ended && state.loading_track.is_none() {
                        println!("Queue finished");
                        break;
                    }
                }
                Ok(PlaybackEvent::StateChanged { status: PlaybackStatus::Error }) => {
                    let state = player.state();
                    eprintln!("Playback error: {}", state.error.unwrap_or_default());
                }
                Ok(PlaybackEvent::Error { message }) => {
                    eprintln!("Playback error: {}", message);
                    if reports_expired_credential(&message) && expire_session(credentials).await {
                        return Err(CliError::SessionExpired.into());
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// Drop a user session whose token the backend refused
///
/// App credentials are left to their refresh schedule.
async fn expire_session(credentials: &CredentialManager) -> bool {
    let dropped = credentials.credential_rejected().await;
    if dropped {
        tracing::warn!("Stored vendor credentials cleared");
    }
    dropped
}

async fn devices(client: &BeatFlowClient, config: &BeatFlowConfig) -> anyhow::Result<()> {
    let credentials = credential_manager(client, config).await;
    restore_credentials(&credentials, config).await?;

    let api = client.device_player(Arc::new(credentials.clone())).await;
    for device in api.devices().await? {
        let marker = if device.is_active { "*" } else { " " };
        println!(
            "{} {} ({}) {}",
            marker,
            device.name,
            device.kind,
            device.id.as_deref().unwrap_or("restricted")
        );
    }

    Ok(())
}

async fn login(
    client: &BeatFlowClient,
    config: &BeatFlowConfig,
    redirect_url: &str,
) -> anyhow::Result<()> {
    if config.auth.credentials_path.is_none() {
        return Err(CliError::Config(
            "auth.credentials_path must be set to store credentials".to_string(),
        )
        .into());
    }

    let grant = parse_redirect(redirect_url)?
        .context("redirect URL carries no access_token/refresh_token/expires_in")?;

    let credentials = credential_manager(client, config).await;
    credentials.store(grant).await;
    println!("Credentials stored");
    Ok(())
}

async fn logout(client: &BeatFlowClient, config: &BeatFlowConfig) -> anyhow::Result<()> {
    let credentials = credential_manager(client, config).await;
    credentials.logout().await;
    println!("Logged out");
    Ok(())
}

async fn credential_manager(client: &BeatFlowClient, config: &BeatFlowConfig) -> CredentialManager {
    let refresher: Arc<dyn TokenRefresher> =
        match (&config.auth.client_id, &config.auth.client_secret) {
            (Some(id), Some(secret)) => Arc::new(
                client
                    .client_credentials_refresher(id.clone(), secret.clone())
                    .await,
            ),
            _ => Arc::new(client.session_refresher().await),
        };

    let policy = config.refresh_policy();
    match &config.auth.credentials_path {
        Some(path) => {
            CredentialManager::with_store(refresher, policy, FileCredentialStore::new(path))
        }
        None => CredentialManager::new(refresher, policy),
    }
}

/// Restore stored credentials, or fetch app credentials when configured
async fn restore_credentials(
    credentials: &CredentialManager,
    config: &BeatFlowConfig,
) -> anyhow::Result<()> {
    if credentials.restore_from_store().await? {
        return Ok(());
    }
    if config.auth.client_id.is_none() {
        return Err(anyhow::anyhow!(
            "no vendor credentials; run `beatflow login <redirect-url>` first"
        ));
    }

    credentials.start();
    let mut state = credentials.subscribe();
    let authenticated = tokio::time::timeout(Duration::from_secs(10), async {
        while state.changed().await.is_ok() {
            if credentials.current_access_token().is_some() {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    if authenticated {
        Ok(())
    } else {
        Err(CliError::Timeout("an app access token").into())
    }
}

fn parse_repeat(value: &str) -> anyhow::Result<RepeatMode> {
    match value.to_ascii_lowercase().as_str() {
        "off" => Ok(RepeatMode::Off),
        "all" => Ok(RepeatMode::All),
        "one" => Ok(RepeatMode::One),
        other => Err(anyhow::anyhow!("unknown repeat mode: {}", other)),
    }
}

fn print_track(track: &CanonicalTrack) {
    let seconds = track.duration_ms / 1000;
    println!(
        "{}  {} - {} [{}:{:02}]",
        track.id,
        track.title,
        track.artist_display(),
        seconds / 60,
        seconds % 60
    );
}
