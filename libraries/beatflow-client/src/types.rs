//! Types for BeatFlow backend and vendor API requests and responses.

use beatflow_playback::resolver::{NamedRef, SpotifyImage};
use beatflow_playback::{resolve_value, CanonicalTrack};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Default BeatFlow backend API root
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default vendor Web API root
pub const DEFAULT_VENDOR_API_URL: &str = "https://api.spotify.com/v1";

/// Default vendor accounts service root
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Configuration for connecting to the BeatFlow backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root (e.g., "http://localhost:5000/api")
    pub api_url: String,
    /// Vendor Web API root used for device control
    pub vendor_api_url: String,
    /// Vendor accounts service root used for token grants
    pub accounts_url: String,
    /// Local account token for the user library endpoints
    pub local_token: Option<String>,
}

impl ClientConfig {
    /// Create a config for `api_url` with the default vendor endpoints.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            vendor_api_url: DEFAULT_VENDOR_API_URL.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            local_token: None,
        }
    }

    /// Create a config with an existing local account token.
    pub fn with_local_token(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            local_token: Some(token.into()),
            ..Self::new(api_url)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

// =============================================================================
// Local Account Types
// =============================================================================

/// Request body for the login endpoint.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for the register endpoint.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response from login/register.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    /// Bearer token for the user library endpoints
    pub token: String,
}

/// Current local user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub favorites: Vec<Value>,
    #[serde(default)]
    pub playlists: Vec<Value>,
}

// =============================================================================
// Vendor Authorization Types
// =============================================================================

/// Request body for the backend token refresh endpoint.
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Access token grant from the backend or the vendor accounts service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent on refresh responses; the previous refresh token stays valid
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token validity in seconds
    pub expires_in: u64,
}

// =============================================================================
// Catalog Types
// =============================================================================

/// Album as listed on the home page.
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<NamedRef>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
}

impl AlbumSummary {
    /// Artist names joined for display
    pub fn artist_display(&self) -> String {
        if self.artists.is_empty() {
            beatflow_playback::resolver::UNKNOWN_ARTIST.to_string()
        } else {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Album with resolved tracks.
#[derive(Debug, Clone)]
pub struct Album {
    pub summary: AlbumSummary,
    pub tracks: Vec<CanonicalTrack>,
}

/// Catalog playlist with resolved tracks.
#[derive(Debug, Clone)]
pub struct CatalogPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tracks: Vec<CanonicalTrack>,
}

/// `{items: [...]}` page wrapper used by the vendor API.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumPayload {
    #[serde(flatten)]
    pub summary: AlbumSummary,
    #[serde(default)]
    pub tracks: Page<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracks: Page<PlaylistItem>,
}

// =============================================================================
// User Library Types
// =============================================================================

/// Playlist stored by the backend for the local user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPlaylist {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub songs: Vec<Value>,
}

impl UserPlaylist {
    /// Playable songs of this playlist
    pub fn tracks(&self) -> Vec<CanonicalTrack> {
        resolve_values(&self.songs)
    }
}

/// Response from deleting a playlist.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedPlaylist {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SongBody<'a> {
    pub song: &'a Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
}

// =============================================================================
// Vendor Device Types
// =============================================================================

/// A playback device registered with the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    /// Absent for restricted devices
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// What the vendor says is playing.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPlayback {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    /// Raw track payload, `null` between tracks or for ads
    #[serde(default)]
    pub item: Option<Value>,
}

impl CurrentPlayback {
    /// Resolve the playing item, if it is a playable track
    pub fn track(&self) -> Option<CanonicalTrack> {
        let item = self.item.as_ref().filter(|v| !v.is_null())?;
        match resolve_value(item) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!(error = %e, "Current playback item is not a playable track");
                None
            }
        }
    }

    /// ID of the device that is playing
    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().and_then(|d| d.id.as_deref())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartPlaybackRequest<'a> {
    pub uris: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,
}

/// Resolve raw payloads, skipping the ones that cannot be played
pub(crate) fn resolve_values(values: &[Value]) -> Vec<CanonicalTrack> {
    values
        .iter()
        .filter(|v| !v.is_null())
        .filter_map(|value| match resolve_value(value) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!(error = %e, "Skipping unplayable track");
                None
            }
        })
        .collect()
}
