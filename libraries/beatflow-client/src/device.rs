//! Vendor device control (the "Connect" Web API).
//!
//! The access token is read from a [`TokenProvider`] on every request, so a
//! refresh is picked up by the very next call.

use crate::client::{build_http_client, error_message, read_json, send_error};
use crate::credentials::TokenProvider;
use crate::error::{ClientError, Result};
use crate::types::{CurrentPlayback, Device, DevicesResponse, StartPlaybackRequest};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Client for the vendor's player endpoints.
#[derive(Clone)]
pub struct DevicePlayerClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl DevicePlayerClient {
    pub(crate) fn new(http: Client, base_url: String, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Create a standalone client for `base_url`.
    pub fn connect(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self::new(build_http_client()?, base_url.into(), tokens))
    }

    /// Devices available to the account.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let url = format!("{}/me/player/devices", self.base_url);
        debug!(url = %url, "Listing devices");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(send_error)?;

        let devices: DevicesResponse = read_json(response, "device list").await?;
        Ok(devices.devices)
    }

    /// Find a device by its display name.
    pub async fn find_device(&self, name: &str) -> Result<Option<Device>> {
        Ok(self
            .devices()
            .await?
            .into_iter()
            .find(|d| d.name == name && d.id.is_some()))
    }

    /// What is playing right now. `None` when nothing is active.
    pub async fn current_playback(&self) -> Result<Option<CurrentPlayback>> {
        let url = format!("{}/me/player", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(send_error)?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(control_error(response).await);
        }
        read_json(response, "playback state").await.map(Some)
    }

    /// Start `uris` on `device_id`.
    pub async fn start_playback(
        &self,
        device_id: &str,
        uris: &[String],
        position_ms: Option<u64>,
    ) -> Result<()> {
        let url = format!("{}/me/player/play", self.base_url);
        debug!(url = %url, device_id = %device_id, uris = ?uris, "Starting playback");

        let request = self
            .http
            .put(&url)
            .query(&[("device_id", device_id)])
            .json(&StartPlaybackRequest { uris, position_ms });
        self.command(request).await
    }

    /// Resume whatever is loaded on `device_id`.
    pub async fn resume(&self, device_id: &str) -> Result<()> {
        let url = format!("{}/me/player/play", self.base_url);
        let request = self
            .http
            .put(&url)
            .query(&[("device_id", device_id)])
            .header(CONTENT_LENGTH, 0);
        self.command(request).await
    }

    pub async fn pause(&self, device_id: &str) -> Result<()> {
        let url = format!("{}/me/player/pause", self.base_url);
        let request = self
            .http
            .put(&url)
            .query(&[("device_id", device_id)])
            .header(CONTENT_LENGTH, 0);
        self.command(request).await
    }

    pub async fn seek(&self, device_id: &str, position_ms: u64) -> Result<()> {
        let url = format!("{}/me/player/seek", self.base_url);
        let request = self
            .http
            .put(&url)
            .query(&[
                ("position_ms", position_ms.to_string().as_str()),
                ("device_id", device_id),
            ])
            .header(CONTENT_LENGTH, 0);
        self.command(request).await
    }

    /// Set volume as a whole percentage (0-100).
    pub async fn set_volume(&self, device_id: &str, volume_percent: u8) -> Result<()> {
        let url = format!("{}/me/player/volume", self.base_url);
        let request = self
            .http
            .put(&url)
            .query(&[
                ("volume_percent", volume_percent.min(100).to_string().as_str()),
                ("device_id", device_id),
            ])
            .header(CONTENT_LENGTH, 0);
        self.command(request).await
    }

    fn token(&self) -> Result<String> {
        self.tokens.access_token().ok_or(ClientError::AuthRequired)
    }

    async fn command(&self, request: RequestBuilder) -> Result<()> {
        let response = request
            .bearer_auth(self.token()?)
            .send()
            .await
            .map_err(send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(control_error(response).await)
        }
    }
}

impl std::fmt::Debug for DevicePlayerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePlayerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Map a failed player request.
///
/// 403 means the account may not control playback (e.g. not Premium).
async fn control_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    match status {
        401 => ClientError::AuthRequired,
        403 => ClientError::PlaybackRejected(message),
        404 => ClientError::NotFound(message),
        _ => ClientError::ServerError { status, message },
    }
}
