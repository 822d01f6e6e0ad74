//! BeatFlow Client
//!
//! HTTP client library for the BeatFlow backend and the vendor Web API.
//!
//! # Features
//!
//! - **Local accounts**: Login, register, current user
//! - **Catalog**: Home page, search, songs, albums and playlists through the backend proxy
//! - **Library**: Favorites and playlists of the local user
//! - **Vendor credentials**: Redirect capture, scheduled refresh, persistence
//! - **Device control**: Transfer, play, pause, seek and volume on a vendor device
//!
//! # Example
//!
//! ```ignore
//! use beatflow_client::{BeatFlowClient, ClientConfig, CredentialManager, RefreshPolicy};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BeatFlowClient::new(ClientConfig::default())?;
//!
//!     // Browse the catalog
//!     let tracks = client.catalog().await.client().search("kesariya").await?;
//!     println!("Found {} playable tracks", tracks.len());
//!
//!     // Keep a vendor token fresh
//!     let refresher = Arc::new(client.session_refresher().await);
//!     let credentials = CredentialManager::new(refresher, RefreshPolicy::user_session());
//!     if let Some(grant) = beatflow_client::parse_redirect("http://localhost:5173/?access_token=a&refresh_token=b&expires_in=3600")? {
//!         credentials.store(grant).await;
//!     }
//!
//!     let devices = client.device_player(Arc::new(credentials)).await.devices().await?;
//!     println!("{} devices", devices.len());
//!     Ok(())
//! }
//! ```

mod auth;
mod catalog;
mod client;
mod credentials;
mod device;
mod error;
mod library;
mod store;
mod types;

// Re-export main types
pub use client::{BeatFlowClient, CatalogClientHandle, LibraryClientHandle};
pub use credentials::{
    ClientCredentialsRefresher, Credential, CredentialManager, CredentialState, RefreshPolicy,
    TokenProvider, TokenRefresher, UserSessionRefresher,
};
pub use error::{ClientError, Result};
pub use store::FileCredentialStore;
pub use types::{
    Album, AlbumSummary, CatalogPlaylist, ClientConfig, CurrentPlayback, DeletedPlaylist, Device,
    LocalSession, TokenGrant, UserPlaylist, UserProfile, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL,
    DEFAULT_VENDOR_API_URL,
};

// Re-export sub-clients for direct use if needed
pub use auth::{parse_redirect, AccountsClient, AuthClient};
pub use catalog::CatalogClient;
pub use device::DevicePlayerClient;
pub use library::LibraryClient;
