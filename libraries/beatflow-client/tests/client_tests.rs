//! Tests for the BeatFlow client library.
//!
//! These tests use mock servers to verify client behavior without
//! requiring a running backend or vendor API.

use beatflow_client::{BeatFlowClient, ClientConfig, ClientError, TokenProvider};
use beatflow_playback::MediaRef;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: format!("{}/api", server.uri()),
        vendor_api_url: format!("{}/v1", server.uri()),
        accounts_url: server.uri(),
        local_token: None,
    }
}

fn spotify_track(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "uri": format!("spotify:track:{id}"),
        "name": format!("Track {id}"),
        "duration_ms": 200_000,
        "artists": [{"name": "Arijit Singh"}],
        "album": {"name": "Album", "images": [{"url": "https://i.scdn.co/a.jpg", "width": 640, "height": 640}]}
    })
}

// =============================================================================
// Client Creation Tests
// =============================================================================

mod client_creation {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BeatFlowClient::new(ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = BeatFlowClient::new(ClientConfig::new(""));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let result = BeatFlowClient::new(ClientConfig::new("ftp://example.com/api"));
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_trailing_slash_trimmed() {
        let client = BeatFlowClient::new(ClientConfig::new("http://localhost:5000/api/")).unwrap();
        assert_eq!(client.api_url().await, "http://localhost:5000/api");
    }
}

// =============================================================================
// Local Account Tests
// =============================================================================

mod local_account {
    use super::*;

    #[tokio::test]
    async fn test_login_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "a@b.c", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "u1",
                "username": "asha",
                "email": "a@b.c",
                "token": "local-jwt"
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        assert!(!client.is_authenticated().await);

        let session = client.login("a@b.c", "pw").await.unwrap();
        assert_eq!(session.id, "u1");
        assert_eq!(session.username, "asha");
        assert!(client.is_authenticated().await);
        assert_eq!(client.local_token().await.as_deref(), Some("local-jwt"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.login("a@b.c", "wrong").await;

        match result {
            Err(ClientError::AuthFailed(msg)) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("Expected AuthFailed, got {:?}", other),
        }
        assert!(!client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "User already exists"})),
            )
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.register("asha", "a@b.c", "pw").await;
        assert!(matches!(result, Err(ClientError::AuthFailed(msg)) if msg == "User already exists"));
    }

    #[tokio::test]
    async fn test_current_user_unauthorized_drops_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Not authorized"})))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.local_token = Some("stale".into());
        let client = BeatFlowClient::new(config).unwrap();

        let result = client.current_user().await;
        assert!(matches!(result, Err(ClientError::AuthRequired)));
        assert!(!client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_server_unreachable() {
        // Nothing listens on port 9
        let client = BeatFlowClient::new(ClientConfig::new("http://127.0.0.1:9/api")).unwrap();
        let result = client.login("a@b.c", "pw").await;
        assert!(matches!(result, Err(ClientError::ServerUnreachable(_))));
    }
}

// =============================================================================
// Catalog Tests
// =============================================================================

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_search_skips_unplayable_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/music/search"))
            .and(query_param("query", "kesariya"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                spotify_track("t1"),
                {"name": "no id, no uri"},
                null,
                spotify_track("t2")
            ])))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let tracks = client.catalog().await.client().search("kesariya").await.unwrap();

        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(tracks[0].media_ref, MediaRef::Uri("spotify:track:t1".into()));
        assert_eq!(tracks[0].artist_names, vec!["Arijit Singh"]);
    }

    #[tokio::test]
    async fn test_album_tracks_inherit_artwork() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/music/album/al1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "al1",
                "name": "Brahmastra",
                "artists": [{"name": "Pritam"}],
                "images": [
                    {"url": "https://i.scdn.co/small.jpg", "width": 64, "height": 64},
                    {"url": "https://i.scdn.co/large.jpg", "width": 640, "height": 640}
                ],
                "tracks": {"items": [
                    {"id": "t1", "uri": "spotify:track:t1", "name": "Kesariya", "duration_ms": 268000}
                ]}
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let album = client.catalog().await.client().album("al1").await.unwrap();

        assert_eq!(album.summary.name, "Brahmastra");
        assert_eq!(album.summary.artist_display(), "Pritam");
        assert_eq!(album.tracks.len(), 1);
        assert_eq!(
            album.tracks[0].artwork_url.as_deref(),
            Some("https://i.scdn.co/large.jpg")
        );
    }

    #[tokio::test]
    async fn test_playlist_skips_removed_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/music/playlist/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "name": "Top Hits",
                "description": "",
                "tracks": {"items": [
                    {"track": spotify_track("t1")},
                    {"track": null}
                ]}
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let playlist = client.catalog().await.client().playlist("p1").await.unwrap();

        assert_eq!(playlist.name, "Top Hits");
        assert!(playlist.description.is_none());
        assert_eq!(playlist.tracks.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_song_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/music/song/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Song not found"})))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.catalog().await.client().song("nope").await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }
}

// =============================================================================
// Library Tests
// =============================================================================

mod library {
    use super::*;

    #[tokio::test]
    async fn test_library_requires_login() {
        let client = BeatFlowClient::new(ClientConfig::default()).unwrap();
        assert!(matches!(client.library().await, Err(ClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_favorites_use_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/favorites"))
            .and(header("authorization", "Bearer local-jwt"))
            .and(body_json(json!({"song": spotify_track("t1")})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([spotify_track("t1")])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.local_token = Some("local-jwt".into());
        let client = BeatFlowClient::new(config).unwrap();

        let library = client.library().await.unwrap();
        let favorites = library.client().add_favorite(&spotify_track("t1")).await.unwrap();
        assert_eq!(favorites.len(), 1);
    }

    #[tokio::test]
    async fn test_playlist_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/playlists"))
            .and(body_json(json!({"name": "Road trip"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "_id": "pl1", "name": "Road trip", "user": "u1", "songs": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/user/playlists/pl1/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "pl1", "name": "Road trip", "user": "u1", "songs": [spotify_track("t1")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/user/playlists/pl1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pl1", "message": "Playlist deleted"
            })))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.local_token = Some("local-jwt".into());
        let client = BeatFlowClient::new(config).unwrap();
        let library = client.library().await.unwrap();
        let library = library.client();

        let created = library.create_playlist("Road trip").await.unwrap();
        assert_eq!(created.id, "pl1");
        assert!(created.songs.is_empty());

        let updated = library.add_to_playlist("pl1", &spotify_track("t1")).await.unwrap();
        assert_eq!(updated.tracks().len(), 1);

        let deleted = library.delete_playlist("pl1").await.unwrap();
        assert_eq!(deleted.id, "pl1");
    }
}

// =============================================================================
// Token Endpoint Tests
// =============================================================================

mod tokens {
    use super::*;
    use beatflow_client::TokenRefresher;

    #[tokio::test]
    async fn test_session_refresh_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/spotify-auth/refresh"))
            .and(body_json(json!({"refreshToken": "AQC2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "BQD9",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let grant = client.session_refresher().await.refresh(Some("AQC2")).await.unwrap();

        assert_eq!(grant.access_token, "BQD9");
        assert_eq!(grant.expires_in, 3600);
        assert!(grant.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_session_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/spotify-auth/refresh"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Failed to refresh token"})),
            )
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.session_refresher().await.refresh(Some("revoked")).await;
        assert!(matches!(result, Err(ClientError::TokenRefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_session_refresh_needs_refresh_token() {
        let client = BeatFlowClient::new(ClientConfig::default()).unwrap();
        let result = client.session_refresher().await.refresh(None).await;
        assert!(matches!(result, Err(ClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_client_credentials_request() {
        let server = MockServer::start().await;
        // base64("id:secret")
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("authorization", "Basic aWQ6c2VjcmV0"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "app-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let grant = client
            .client_credentials_refresher("id", "secret")
            .await
            .refresh(None)
            .await
            .unwrap();
        assert_eq!(grant.access_token, "app-token");
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "BQD1",
                "refresh_token": "AQC2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let grant = client
            .exchange_code("abc", "http://localhost:5000/api/spotify-auth/callback", "id", "secret")
            .await
            .unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("AQC2"));
    }
}

// =============================================================================
// Device Control Tests
// =============================================================================

mod device_control {
    use super::*;

    fn token(value: &'static str) -> Arc<dyn TokenProvider> {
        Arc::new(move || Some(value.to_string()))
    }

    #[tokio::test]
    async fn test_nothing_playing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let player = client.device_player(token("BQD1")).await;
        assert!(player.current_playback().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_playback_resolves_track() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device": {"id": "d1", "name": "BeatFlow Web Player", "type": "Computer", "is_active": true, "volume_percent": 50},
                "progress_ms": 1234,
                "is_playing": true,
                "item": spotify_track("t1")
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let playback = client
            .device_player(token("BQD1"))
            .await
            .current_playback()
            .await
            .unwrap()
            .unwrap();

        assert!(playback.is_playing);
        assert_eq!(playback.progress_ms, Some(1234));
        assert_eq!(playback.device_id(), Some("d1"));
        assert_eq!(playback.track().map(|t| t.id), Some("t1".to_string()));
    }

    #[tokio::test]
    async fn test_start_playback_request() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/me/player/play"))
            .and(query_param("device_id", "d1"))
            .and(header("authorization", "Bearer BQD1"))
            .and(body_json(json!({"uris": ["spotify:track:t1"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        client
            .device_player(token("BQD1"))
            .await
            .start_playback("d1", &["spotify:track:t1".to_string()], None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_device_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/player/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": [
                {"id": "d0", "name": "Phone", "type": "Smartphone", "is_active": true},
                {"id": "d1", "name": "BeatFlow Web Player", "type": "Computer", "is_active": false}
            ]})))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let player = client.device_player(token("BQD1")).await;

        let device = player.find_device("BeatFlow Web Player").await.unwrap().unwrap();
        assert_eq!(device.id.as_deref(), Some("d1"));
        assert!(player.find_device("Kitchen").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_forbidden_is_playback_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/me/player/pause"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"status": 403, "message": "Player command failed: Premium required"}
            })))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.device_player(token("BQD1")).await.pause("d1").await;

        match result {
            Err(ClientError::PlaybackRejected(msg)) => assert!(msg.contains("Premium required")),
            other => panic!("Expected PlaybackRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_auth_required() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/me/player/seek"))
            .and(query_param("position_ms", "30000"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let result = client.device_player(token("old")).await.seek("d1", 30_000).await;
        assert!(matches!(result, Err(ClientError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_no_token_never_sends() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let client = BeatFlowClient::new(config_for(&server)).unwrap();
        let player = client.device_player(Arc::new(|| None::<String>)).await;
        let result = player.set_volume("d1", 50).await;
        assert!(matches!(result, Err(ClientError::AuthRequired)));
    }
}
