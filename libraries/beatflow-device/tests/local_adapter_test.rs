//! Local media playback end to end: player, adapter and headless element
//! against a mock media server.

use beatflow_device::{DeviceError, HeadlessMediaElement, LocalMediaAdapter, MediaElement};
use beatflow_playback::{
    CanonicalTrack, MediaRef, PlaybackAdapter, PlaybackConfig, PlaybackError, PlaybackState,
    PlaybackStatus, Player, PlayerHandle, RepeatMode,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Helpers =====

async fn media_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/t1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/t2.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

fn track(server: &MockServer, id: &str, duration_ms: u64) -> CanonicalTrack {
    CanonicalTrack {
        id: id.to_string(),
        title: format!("Track {id}"),
        artist_names: vec!["Artist".into()],
        artwork_url: None,
        media_ref: MediaRef::Url(format!("{}/media/{id}.mp4", server.uri())),
        duration_ms,
    }
}

fn element() -> Arc<HeadlessMediaElement> {
    Arc::new(HeadlessMediaElement::with_client(
        reqwest::Client::new(),
        Duration::from_millis(50),
    ))
}

async fn wait_for_state(
    player: &PlayerHandle,
    predicate: impl FnMut(&PlaybackState) -> bool,
) -> PlaybackState {
    let mut rx = player.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("state never reached")
        .expect("player closed");
    state.clone()
}

// ===== Element =====

#[tokio::test]
async fn test_element_fetches_source() {
    let server = media_server().await;
    let element = element();

    element
        .load(&format!("{}/media/t1.mp4", server.uri()), 1_000)
        .await
        .unwrap();
    assert!(element.source().unwrap().ends_with("/media/t1.mp4"));
    assert_eq!(element.position_ms(), 0);
}

#[tokio::test]
async fn test_element_load_fails_for_missing_media() {
    let server = media_server().await;
    let element = element();

    let result = element
        .load(&format!("{}/media/gone.mp4", server.uri()), 1_000)
        .await;
    assert!(result.is_err());
    assert!(element.source().is_none());
}

#[tokio::test]
async fn test_slow_load_does_not_replace_newer_source() {
    let server = media_server().await;
    let element = element();

    let slow = {
        let element = Arc::clone(&element);
        let url = format!("{}/media/slow.mp4", server.uri());
        tokio::spawn(async move { element.load(&url, 1_000).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    element
        .load(&format!("{}/media/t1.mp4", server.uri()), 1_000)
        .await
        .unwrap();

    let result = slow.await.unwrap();
    assert!(matches!(result, Err(DeviceError::Superseded)));
    assert!(element.source().unwrap().ends_with("/media/t1.mp4"));
}

// ===== Player =====

#[tokio::test]
async fn test_local_playback_advances_through_queue() {
    let server = media_server().await;
    let adapter = Arc::new(LocalMediaAdapter::new(element()));
    let player = Player::spawn(
        adapter,
        PlaybackConfig {
            repeat: RepeatMode::Off,
            tick_interval: Duration::from_millis(50),
            ..PlaybackConfig::default()
        },
    );

    player
        .play_queue(vec![track(&server, "t1", 300), track(&server, "t2", 300)], 0)
        .await
        .unwrap();

    let state = wait_for_state(&player, |s| {
        s.status == PlaybackStatus::Ended
            && s.current_track.as_ref().map(|t| t.id.as_str()) == Some("t2")
    })
    .await;
    assert_eq!(state.position_ms, 300);
}

#[tokio::test]
async fn test_missing_media_fails_the_load() {
    let server = media_server().await;
    let adapter = Arc::new(LocalMediaAdapter::new(element()));
    let player = Player::spawn(adapter, PlaybackConfig::default());

    let result = player.play(track(&server, "gone", 1_000)).await;
    assert!(matches!(result, Err(PlaybackError::PlaybackRejected { .. })));

    let state = wait_for_state(&player, |s| s.status == PlaybackStatus::Error).await;
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let server = media_server().await;
    let adapter = Arc::new(LocalMediaAdapter::new(element()));
    assert!(adapter.is_ready());
    let player = Player::spawn(adapter, PlaybackConfig::default());

    player.play(track(&server, "t1", 60_000)).await.unwrap();
    wait_for_state(&player, |s| s.status == PlaybackStatus::Playing).await;

    player.toggle_play_pause().await.unwrap();
    wait_for_state(&player, |s| s.status == PlaybackStatus::Paused).await;

    player.toggle_play_pause().await.unwrap();
    wait_for_state(&player, |s| s.status == PlaybackStatus::Playing).await;
}

#[tokio::test]
async fn test_superseded_play_leaves_new_track_running() {
    let server = media_server().await;
    let element = element();
    let adapter = Arc::new(LocalMediaAdapter::new(element.clone()));
    let player = Player::spawn(
        adapter,
        PlaybackConfig {
            repeat: RepeatMode::Off,
            tick_interval: Duration::from_millis(50),
            ..PlaybackConfig::default()
        },
    );

    let first = {
        let player = player.clone();
        let slow = track(&server, "slow", 600);
        tokio::spawn(async move { player.play(slow).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    player.play(track(&server, "t2", 600)).await.unwrap();

    // The overtaken play is not its caller's failure
    first.await.unwrap().unwrap();

    let state = wait_for_state(&player, |s| {
        s.status == PlaybackStatus::Ended
            && s.current_track.as_ref().map(|t| t.id.as_str()) == Some("t2")
    })
    .await;
    assert_eq!(state.position_ms, 600);
    assert!(element.source().unwrap().ends_with("/media/t2.mp4"));
}
