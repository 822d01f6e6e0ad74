//! Playback adapters for BeatFlow
//!
//! This crate provides the two [`PlaybackAdapter`] implementations the
//! player core drives:
//!
//! - [`LocalMediaAdapter`]: direct media URLs through a [`MediaElement`]
//! - [`RemoteDeviceAdapter`]: provider URIs on a vendor playback device
//!
//! The variant is chosen once, at construction, from [`AdapterKind`].
//!
//! # Example
//!
//! ```no_run
//! use beatflow_device::{build_adapter, AdapterKind, AdapterOptions, SdkHook};
//! use beatflow_playback::{PlaybackConfig, Player};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = AdapterOptions {
//!     kind: AdapterKind::LocalMedia,
//!     ..AdapterOptions::default()
//! };
//! let tokens = Arc::new(|| None::<String>);
//! let adapter = build_adapter(&options, tokens, SdkHook::global())?;
//!
//! let player = Player::spawn(adapter, PlaybackConfig::default());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod local;
pub mod media;
pub mod remote;
pub mod sdk_hook;

pub use error::{DeviceError, Result};
pub use local::LocalMediaAdapter;
pub use media::{ElementEvent, ElementListener, HeadlessMediaElement, MediaElement};
pub use remote::{RemoteDeviceAdapter, RemoteDeviceConfig, DEFAULT_DEVICE_NAME};
pub use sdk_hook::{Registration, SdkHook};

use beatflow_client::{DevicePlayerClient, TokenProvider, DEFAULT_VENDOR_API_URL};
use beatflow_playback::PlaybackAdapter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Which playback backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Play direct media URLs locally
    #[default]
    LocalMedia,
    /// Control a vendor playback device
    RemoteDevice,
}

/// Everything needed to build an adapter
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub kind: AdapterKind,
    /// Vendor Web API root (remote device only)
    pub vendor_api_url: String,
    pub remote: RemoteDeviceConfig,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            kind: AdapterKind::default(),
            vendor_api_url: DEFAULT_VENDOR_API_URL.to_string(),
            remote: RemoteDeviceConfig::default(),
        }
    }
}

/// Build the configured adapter
///
/// A remote device adapter is attached to `hook` and connects once the
/// vendor SDK is marked loaded. Call from within a tokio runtime.
pub fn build_adapter(
    options: &AdapterOptions,
    tokens: Arc<dyn TokenProvider>,
    hook: &SdkHook,
) -> Result<Arc<dyn PlaybackAdapter>> {
    match options.kind {
        AdapterKind::LocalMedia => {
            info!("Using local media adapter");
            let element = Arc::new(HeadlessMediaElement::new()?);
            Ok(Arc::new(LocalMediaAdapter::new(element)))
        }
        AdapterKind::RemoteDevice => {
            info!(device_name = %options.remote.device_name, "Using remote device adapter");
            let api = DevicePlayerClient::connect(options.vendor_api_url.clone(), tokens)?;
            let adapter = Arc::new(RemoteDeviceAdapter::new(api, options.remote.clone()));
            let registration = adapter.attach_to(hook);
            info!(registration = ?registration, "Remote device attached to SDK hook");
            Ok(adapter)
        }
    }
}
