/// Player configuration
use crate::error::{CliError, Result};
use beatflow_client::{
    ClientConfig, RefreshPolicy, DEFAULT_ACCOUNTS_URL, DEFAULT_API_URL, DEFAULT_VENDOR_API_URL,
};
use beatflow_device::{AdapterKind, AdapterOptions, RemoteDeviceConfig, DEFAULT_DEVICE_NAME};
use beatflow_playback::{PlaybackConfig, RepeatMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "beatflow.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BeatFlowConfig {
    #[serde(default = "default_api")]
    pub api: ApiSettings,

    #[serde(default = "default_player")]
    pub player: PlayerSettings,

    #[serde(default = "default_auth")]
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_vendor_api_url")]
    pub vendor_api_url: String,

    #[serde(default = "default_accounts_url")]
    pub accounts_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default)]
    pub adapter: AdapterKind,

    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_repeat")]
    pub repeat: RepeatMode,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default)]
    pub optimistic_toggle: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthSettings {
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,

    /// Where vendor credentials are persisted between runs
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// App credentials; when set, tokens are refreshed server-wide
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

impl BeatFlowConfig {
    /// Load configuration from file and environment
    ///
    /// Reads `path` when given, otherwise `beatflow.toml` if present, then
    /// applies `BEATFLOW_<SECTION>__<KEY>` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if config_path.exists() {
                    settings = settings.add_source(config::File::from(config_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("BEATFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("api.base_url", &self.api.base_url),
            ("api.vendor_api_url", &self.api.vendor_api_url),
            ("api.accounts_url", &self.api.accounts_url),
        ];
        for (key, value) in urls {
            if value.trim().is_empty() {
                return Err(CliError::Config(format!("{key} must not be empty")));
            }
        }

        if !(0.0..=1.0).contains(&self.player.volume) {
            return Err(CliError::Config(format!(
                "player.volume must be within [0, 1], got {}",
                self.player.volume
            )));
        }

        let intervals = [
            ("player.tick_interval_ms", self.player.tick_interval_ms),
            ("player.poll_interval_ms", self.player.poll_interval_ms),
            ("player.load_timeout_ms", self.player.load_timeout_ms),
            ("player.command_timeout_ms", self.player.command_timeout_ms),
        ];
        for (key, value) in intervals {
            if value == 0 {
                return Err(CliError::Config(format!("{key} must be greater than zero")));
            }
        }

        if self.player.adapter == AdapterKind::RemoteDevice && self.player.device_name.is_empty()
        {
            return Err(CliError::Config(
                "player.device_name is required for the remote device adapter".to_string(),
            ));
        }

        if self.auth.client_id.is_some() != self.auth.client_secret.is_some() {
            return Err(CliError::Config(
                "auth.client_id and auth.client_secret must be set together".to_string(),
            ));
        }

        Ok(())
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            volume: self.player.volume,
            repeat: self.player.repeat,
            tick_interval: Duration::from_millis(self.player.tick_interval_ms),
            load_timeout: Duration::from_millis(self.player.load_timeout_ms),
            command_timeout: Duration::from_millis(self.player.command_timeout_ms),
            optimistic_toggle: self.player.optimistic_toggle,
            ..PlaybackConfig::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            vendor_api_url: self.api.vendor_api_url.clone(),
            accounts_url: self.api.accounts_url.clone(),
            ..ClientConfig::new(self.api.base_url.clone())
        }
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            kind: self.player.adapter,
            vendor_api_url: self.api.vendor_api_url.clone(),
            remote: RemoteDeviceConfig {
                device_name: self.player.device_name.clone(),
                poll_interval: Duration::from_millis(self.player.poll_interval_ms),
                ..RemoteDeviceConfig::default()
            },
        }
    }

    /// Server-wide refresh when app credentials are configured, per-user otherwise
    pub fn refresh_policy(&self) -> RefreshPolicy {
        if self.auth.client_id.is_some() {
            RefreshPolicy::server_wide()
        } else {
            RefreshPolicy::UserSession {
                margin: Duration::from_secs(self.auth.refresh_margin_secs),
            }
        }
    }
}

impl Default for BeatFlowConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            player: default_player(),
            auth: default_auth(),
        }
    }
}

// Default values
fn default_api() -> ApiSettings {
    ApiSettings {
        base_url: default_base_url(),
        vendor_api_url: default_vendor_api_url(),
        accounts_url: default_accounts_url(),
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_vendor_api_url() -> String {
    DEFAULT_VENDOR_API_URL.to_string()
}

fn default_accounts_url() -> String {
    DEFAULT_ACCOUNTS_URL.to_string()
}

fn default_player() -> PlayerSettings {
    PlayerSettings {
        adapter: AdapterKind::default(),
        device_name: default_device_name(),
        repeat: default_repeat(),
        volume: default_volume(),
        tick_interval_ms: default_tick_interval_ms(),
        poll_interval_ms: default_poll_interval_ms(),
        load_timeout_ms: default_load_timeout_ms(),
        command_timeout_ms: default_command_timeout_ms(),
        optimistic_toggle: false,
    }
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_repeat() -> RepeatMode {
    RepeatMode::All
}

fn default_volume() -> f32 {
    0.5
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_command_timeout_ms() -> u64 {
    5_000
}

fn default_auth() -> AuthSettings {
    AuthSettings {
        refresh_margin_secs: default_refresh_margin_secs(),
        credentials_path: None,
        client_id: None,
        client_secret: None,
    }
}

fn default_refresh_margin_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BeatFlowConfig::default();
        assert!(config.validate().is_ok());

        let playback = config.playback_config();
        assert_eq!(playback.repeat, RepeatMode::All);
        assert_eq!(playback.volume, 0.5);
        assert_eq!(playback.tick_interval, Duration::from_millis(250));
        assert_eq!(playback.load_timeout, Duration::from_secs(10));
        assert_eq!(playback.command_timeout, Duration::from_secs(5));
        assert!(!playback.optimistic_toggle);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
            [api]
            base_url = "http://music.local:5000/api"

            [player]
            adapter = "remote_device"
            repeat = "one"
            volume = 0.8
            poll_interval_ms = 500

            [auth]
            credentials_path = "/tmp/beatflow/credentials.json"
            "#,
        );

        let config = BeatFlowConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "http://music.local:5000/api");
        assert_eq!(config.api.vendor_api_url, DEFAULT_VENDOR_API_URL);
        assert_eq!(config.player.adapter, AdapterKind::RemoteDevice);
        assert_eq!(config.player.repeat, RepeatMode::One);
        assert_eq!(config.player.volume, 0.8);
        assert_eq!(config.player.device_name, DEFAULT_DEVICE_NAME);
        assert_eq!(
            config.auth.credentials_path,
            Some(PathBuf::from("/tmp/beatflow/credentials.json"))
        );

        let options = config.adapter_options();
        assert_eq!(options.kind, AdapterKind::RemoteDevice);
        assert_eq!(options.remote.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = BeatFlowConfig::load(Some(Path::new("/nonexistent/beatflow.toml")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BeatFlowConfig::default();
        config.api.base_url = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = BeatFlowConfig::default();
        config.player.volume = 1.5;
        assert!(config.validate().is_err());

        let mut config = BeatFlowConfig::default();
        config.player.volume = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = BeatFlowConfig::default();
        config.player.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BeatFlowConfig::default();
        config.auth.client_id = Some("id".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_policy_selection() {
        let mut config = BeatFlowConfig::default();
        config.auth.refresh_margin_secs = 120;
        assert_eq!(
            config.refresh_policy(),
            RefreshPolicy::UserSession {
                margin: Duration::from_secs(120)
            }
        );

        config.auth.client_id = Some("id".to_string());
        config.auth.client_secret = Some("secret".to_string());
        assert_eq!(config.refresh_policy(), RefreshPolicy::server_wide());
    }

    #[test]
    fn test_client_config_uses_api_section() {
        let mut config = BeatFlowConfig::default();
        config.api.accounts_url = "http://accounts.local".to_string();

        let client = config.client_config();
        assert_eq!(client.api_url, DEFAULT_API_URL);
        assert_eq!(client.accounts_url, "http://accounts.local");
        assert!(client.local_token.is_none());
    }
}
