//! Catalog browsing through the BeatFlow backend music proxy.

use crate::client::{read_json, send_error};
use crate::error::{ClientError, Result};
use crate::types::{
    resolve_values, Album, AlbumPayload, AlbumSummary, CatalogPlaylist, PlaylistPayload,
};
use beatflow_playback::{resolve_value, CanonicalTrack};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Catalog client. No authentication needed.
pub struct CatalogClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> CatalogClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// New releases shown on the home page.
    pub async fn home(&self) -> Result<Vec<AlbumSummary>> {
        let url = format!("{}/music/home", self.base_url);
        debug!(url = %url, "Fetching home page");

        let response = self.http.get(&url).send().await.map_err(send_error)?;
        read_json(response, "home page").await
    }

    /// Search tracks. Entries that cannot be played are skipped.
    pub async fn search(&self, query: &str) -> Result<Vec<CanonicalTrack>> {
        let url = format!("{}/music/search", self.base_url);
        debug!(url = %url, query = %query, "Searching catalog");

        let response = self
            .http
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(send_error)?;

        let items: Vec<Value> = read_json(response, "search results").await?;
        let tracks = resolve_values(&items);
        debug!(found = items.len(), playable = tracks.len(), "Search complete");
        Ok(tracks)
    }

    /// Fetch a single song.
    pub async fn song(&self, id: &str) -> Result<CanonicalTrack> {
        let url = format!("{}/music/song/{}", self.base_url, id);
        debug!(url = %url, "Fetching song");

        let response = self.http.get(&url).send().await.map_err(send_error)?;
        let raw: Value = read_json(response, "song").await?;
        resolve_value(&raw).map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Fetch an album with its playable tracks.
    ///
    /// Album tracks carry no artwork of their own; they get the album's.
    pub async fn album(&self, id: &str) -> Result<Album> {
        let url = format!("{}/music/album/{}", self.base_url, id);
        debug!(url = %url, "Fetching album");

        let response = self.http.get(&url).send().await.map_err(send_error)?;
        let payload: AlbumPayload = read_json(response, "album").await?;

        let album_ref = json!({
            "name": payload.summary.name,
            "images": payload
                .summary
                .images
                .iter()
                .map(|img| json!({"url": img.url, "width": img.width, "height": img.height}))
                .collect::<Vec<_>>(),
        });
        let items: Vec<Value> = payload
            .tracks
            .items
            .into_iter()
            .map(|mut track| {
                if let Some(obj) = track.as_object_mut() {
                    obj.entry("album").or_insert_with(|| album_ref.clone());
                }
                track
            })
            .collect();

        Ok(Album {
            summary: payload.summary,
            tracks: resolve_values(&items),
        })
    }

    /// Fetch a catalog playlist with its playable tracks.
    pub async fn playlist(&self, id: &str) -> Result<CatalogPlaylist> {
        let url = format!("{}/music/playlist/{}", self.base_url, id);
        debug!(url = %url, "Fetching playlist");

        let response = self.http.get(&url).send().await.map_err(send_error)?;
        let payload: PlaylistPayload = read_json(response, "playlist").await?;

        let items: Vec<Value> = payload
            .tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .collect();

        Ok(CatalogPlaylist {
            id: payload.id,
            name: payload.name,
            description: payload.description.filter(|d| !d.is_empty()),
            tracks: resolve_values(&items),
        })
    }
}
