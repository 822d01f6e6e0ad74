//! Main BeatFlow client.

use crate::auth::{AccountsClient, AuthClient};
use crate::catalog::CatalogClient;
use crate::credentials::{ClientCredentialsRefresher, TokenProvider, UserSessionRefresher};
use crate::device::DevicePlayerClient;
use crate::error::{ClientError, Result};
use crate::library::LibraryClient;
use crate::types::{ClientConfig, LocalSession, TokenGrant, UserProfile};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Main client for the BeatFlow backend.
///
/// Holds the local account token used by the user library endpoints and
/// hands out sub-clients for the catalog, the library and vendor device
/// control.
///
/// # Example
///
/// ```ignore
/// use beatflow_client::{BeatFlowClient, ClientConfig};
///
/// let client = BeatFlowClient::new(ClientConfig::new("http://localhost:5000/api"))?;
///
/// // Catalog needs no login
/// let tracks = client.catalog().await.client().search("kesariya").await?;
///
/// // Library needs a local account
/// client.login("me@example.com", "secret").await?;
/// let favorites = client.library().await?.client().favorites().await?;
/// ```
pub struct BeatFlowClient {
    http: Client,
    config: Arc<RwLock<ClientConfig>>,
}

impl BeatFlowClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let normalized_config = ClientConfig {
            api_url: normalize_url(&config.api_url)?,
            vendor_api_url: normalize_url(&config.vendor_api_url)?,
            accounts_url: normalize_url(&config.accounts_url)?,
            local_token: config.local_token,
        };

        Ok(Self {
            http: build_http_client()?,
            config: Arc::new(RwLock::new(normalized_config)),
        })
    }

    /// Get the backend API root.
    pub async fn api_url(&self) -> String {
        self.config.read().await.api_url.clone()
    }

    /// Check if the client has a local account token.
    pub async fn is_authenticated(&self) -> bool {
        self.config.read().await.local_token.is_some()
    }

    /// Get the local account token.
    pub async fn local_token(&self) -> Option<String> {
        self.config.read().await.local_token.clone()
    }

    /// Set the local account token directly (e.g., from stored credentials).
    pub async fn set_local_token(&self, token: Option<String>) {
        self.config.write().await.local_token = token;
    }

    /// Login with email and password.
    ///
    /// On success, the local token is stored for subsequent library requests.
    pub async fn login(&self, email: &str, password: &str) -> Result<LocalSession> {
        let url = self.api_url().await;
        let session = AuthClient::new(&self.http, &url)
            .login(email, password)
            .await?;

        self.set_local_token(Some(session.token.clone())).await;
        Ok(session)
    }

    /// Create a local account and log in.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<LocalSession> {
        let url = self.api_url().await;
        let session = AuthClient::new(&self.http, &url)
            .register(username, email, password)
            .await?;

        self.set_local_token(Some(session.token.clone())).await;
        Ok(session)
    }

    /// Fetch the current local user.
    ///
    /// A refused token is dropped, as a stale local session is useless.
    pub async fn current_user(&self) -> Result<UserProfile> {
        let config = self.config.read().await;
        let token = config
            .local_token
            .clone()
            .ok_or(ClientError::AuthRequired)?;
        let url = config.api_url.clone();
        drop(config);

        let result = AuthClient::new(&self.http, &url).me(&token).await;
        if matches!(result, Err(ClientError::AuthRequired)) {
            self.set_local_token(None).await;
        }
        result
    }

    /// Clear the local account token.
    pub async fn logout(&self) {
        self.set_local_token(None).await;
        info!("Logged out of local account");
    }

    /// Exchange an authorization code for a vendor token grant.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant> {
        let url = self.config.read().await.accounts_url.clone();
        AccountsClient::new(&self.http, &url)
            .exchange_code(code, redirect_uri, client_id, client_secret)
            .await
    }

    /// Get a catalog client. No authentication needed.
    pub async fn catalog(&self) -> CatalogClientHandle {
        CatalogClientHandle {
            http: self.http.clone(),
            url: self.api_url().await,
        }
    }

    /// Get a library client for favorites and playlists.
    ///
    /// Returns an error if not logged in.
    pub async fn library(&self) -> Result<LibraryClientHandle> {
        let config = self.config.read().await;
        let access_token = config
            .local_token
            .clone()
            .ok_or(ClientError::AuthRequired)?;
        let url = config.api_url.clone();
        drop(config);

        Ok(LibraryClientHandle {
            http: self.http.clone(),
            url,
            access_token,
        })
    }

    /// Get a vendor device control client reading tokens from `tokens`.
    pub async fn device_player(&self, tokens: Arc<dyn TokenProvider>) -> DevicePlayerClient {
        let url = self.config.read().await.vendor_api_url.clone();
        DevicePlayerClient::new(self.http.clone(), url, tokens)
    }

    /// Refresher for per-user vendor tokens, backed by the BeatFlow backend.
    pub async fn session_refresher(&self) -> UserSessionRefresher {
        UserSessionRefresher::new(self.http.clone(), self.api_url().await)
    }

    /// Refresher for app-wide client-credentials tokens.
    pub async fn client_credentials_refresher(
        &self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ClientCredentialsRefresher {
        let url = self.config.read().await.accounts_url.clone();
        ClientCredentialsRefresher::new(self.http.clone(), url, client_id, client_secret)
    }
}

/// Handle for catalog operations.
pub struct CatalogClientHandle {
    http: Client,
    url: String,
}

impl CatalogClientHandle {
    /// Get the catalog client.
    pub fn client(&self) -> CatalogClient<'_> {
        CatalogClient::new(&self.http, &self.url)
    }
}

/// Handle for library operations.
///
/// This is returned by `BeatFlowClient::library()`.
pub struct LibraryClientHandle {
    http: Client,
    url: String,
    access_token: String,
}

impl LibraryClientHandle {
    /// Get the library client.
    pub fn client(&self) -> LibraryClient<'_> {
        LibraryClient::new(&self.http, &self.url, &self.access_token)
    }
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

/// HTTP client with the timeouts used for every BeatFlow request.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("BeatFlow/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ClientError::Request)
}

fn normalize_url(url: &str) -> Result<String> {
    if url.is_empty() {
        return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
    }

    let url = url.trim_end_matches('/').to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ClientError::InvalidUrl(
            "URL must start with http:// or https://".into(),
        ));
    }
    url::Url::parse(&url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

    Ok(url)
}

/// Map a transport failure.
pub(crate) fn send_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::ServerUnreachable(e.to_string())
    } else {
        ClientError::Request(e)
    }
}

/// Parse a successful JSON response or map the failure status.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    if response.status().is_success() {
        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse {}: {}", what, e)))
    } else {
        Err(error_from_response(response).await)
    }
}

/// Map a non-success response to an error.
pub(crate) async fn error_from_response(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    match status {
        401 => ClientError::AuthRequired,
        404 => ClientError::NotFound(message),
        _ => ClientError::ServerError { status, message },
    }
}

/// Pull a readable message out of an error body.
///
/// The backend answers `{"message": ..}`, the vendor `{"error": {"message": ..}}`.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    value
        .get("message")
        .or_else(|| value.get("error").and_then(|e| e.get("message")))
        .or_else(|| value.get("error_description"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
