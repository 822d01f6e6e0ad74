//! User library operations (favorites and playlists) on the BeatFlow backend.

use crate::client::{read_json, send_error};
use crate::error::Result;
use crate::types::{
    resolve_values, CreatePlaylistRequest, DeletedPlaylist, SongBody, UserPlaylist,
};
use beatflow_playback::CanonicalTrack;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Library client for the local user.
///
/// Songs are stored as the raw provider payload so they can be resolved
/// again when played.
pub struct LibraryClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> LibraryClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    // ===== Favorites =====

    /// Raw favorite songs.
    pub async fn favorites(&self) -> Result<Vec<Value>> {
        let url = format!("{}/user/favorites", self.base_url);
        debug!(url = %url, "Fetching favorites");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "favorites").await
    }

    /// Playable favorite songs.
    pub async fn favorite_tracks(&self) -> Result<Vec<CanonicalTrack>> {
        Ok(resolve_values(&self.favorites().await?))
    }

    /// Add a song, returning the updated favorites.
    pub async fn add_favorite(&self, song: &Value) -> Result<Vec<Value>> {
        let url = format!("{}/user/favorites", self.base_url);
        debug!(url = %url, "Adding favorite");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .json(&SongBody { song })
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "favorites").await
    }

    /// Remove a song by ID, returning the updated favorites.
    pub async fn remove_favorite(&self, song_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/user/favorites/{}", self.base_url, song_id);
        debug!(url = %url, "Removing favorite");

        let response = self
            .http
            .delete(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "favorites").await
    }

    // ===== Playlists =====

    /// All playlists of the user.
    pub async fn playlists(&self) -> Result<Vec<UserPlaylist>> {
        let url = format!("{}/user/playlists", self.base_url);
        debug!(url = %url, "Fetching playlists");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "playlists").await
    }

    /// Create an empty playlist.
    pub async fn create_playlist(&self, name: &str) -> Result<UserPlaylist> {
        let url = format!("{}/user/playlists", self.base_url);
        debug!(url = %url, name = %name, "Creating playlist");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .json(&CreatePlaylistRequest { name })
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "playlist").await
    }

    /// Fetch one playlist.
    pub async fn playlist(&self, playlist_id: &str) -> Result<UserPlaylist> {
        let url = format!("{}/user/playlists/{}", self.base_url, playlist_id);
        debug!(url = %url, "Fetching playlist");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "playlist").await
    }

    /// Append a song, returning the updated playlist.
    pub async fn add_to_playlist(&self, playlist_id: &str, song: &Value) -> Result<UserPlaylist> {
        let url = format!("{}/user/playlists/{}/add", self.base_url, playlist_id);
        debug!(url = %url, "Adding song to playlist");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .json(&SongBody { song })
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "playlist").await
    }

    /// Delete a playlist.
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<DeletedPlaylist> {
        let url = format!("{}/user/playlists/{}", self.base_url, playlist_id);
        debug!(url = %url, "Deleting playlist");

        let response = self
            .http
            .delete(&url)
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "delete response").await
    }
}
