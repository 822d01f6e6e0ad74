//! Credential lifecycle
//!
//! Holds the vendor access credential, refreshes it ahead of expiry and
//! hands the current token to readers through [`TokenProvider`].
//!
//! ```text
//! Unauthenticated -> Authenticated -> Refreshing -> Authenticated
//!                                               \-> Unauthenticated (forced logout)
//! ```

use crate::auth::{AccountsClient, AuthClient};
use crate::error::{ClientError, Result};
use crate::store::FileCredentialStore;
use crate::types::TokenGrant;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stored access credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch_ms: i64,
}

impl Credential {
    /// Build from a grant received at `now_ms`
    pub fn from_grant(grant: &TokenGrant, now_ms: i64) -> Self {
        let lifetime_ms = i64::try_from(grant.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        Self {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at_epoch_ms: now_ms.saturating_add(lifetime_ms),
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_epoch_ms())
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now_ms: i64) -> Duration {
        let left = self.expires_at_epoch_ms.saturating_sub(now_ms).max(0);
        Duration::from_millis(left as u64)
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lifecycle state of the credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialState {
    Unauthenticated,
    Authenticated,
    Refreshing,
}

/// Read-only access to the current token
///
/// Adapters call this on every request. `None` means no usable token.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}

/// Source of fresh tokens
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new grant. `refresh_token` is `None` for flows that need none.
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenGrant>;
}

/// Refreshes per-user tokens through the BeatFlow backend
pub struct UserSessionRefresher {
    http: Client,
    api_url: String,
}

impl UserSessionRefresher {
    pub fn new(http: Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenRefresher for UserSessionRefresher {
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenGrant> {
        let refresh_token = refresh_token.ok_or(ClientError::AuthRequired)?;
        AuthClient::new(&self.http, &self.api_url)
            .refresh_user_token(refresh_token)
            .await
    }
}

/// Obtains app-wide tokens with the client-credentials flow
pub struct ClientCredentialsRefresher {
    http: Client,
    accounts_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsRefresher {
    pub fn new(
        http: Client,
        accounts_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            accounts_url: accounts_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for ClientCredentialsRefresher {
    async fn refresh(&self, _refresh_token: Option<&str>) -> Result<TokenGrant> {
        AccountsClient::new(&self.http, &self.accounts_url)
            .client_credentials(&self.client_id, &self.client_secret)
            .await
    }
}

/// When to refresh and what a failed refresh means
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshPolicy {
    /// Refresh `margin` before expiry; a failed refresh logs the user out
    UserSession { margin: Duration },

    /// Refresh after `lifetime_fraction` of the lifetime; retry failures
    /// after `retry_delay`, indefinitely
    ServerWide {
        lifetime_fraction: f64,
        retry_delay: Duration,
    },
}

impl RefreshPolicy {
    /// 60 s margin, forced logout on failure
    pub fn user_session() -> Self {
        RefreshPolicy::UserSession {
            margin: Duration::from_secs(60),
        }
    }

    /// Refresh at 90% of the lifetime, retry after 60 s
    pub fn server_wide() -> Self {
        RefreshPolicy::ServerWide {
            lifetime_fraction: 0.9,
            retry_delay: Duration::from_secs(60),
        }
    }

    /// Delay before refreshing a token valid for `lifetime`
    pub fn refresh_delay(&self, lifetime: Duration) -> Duration {
        match self {
            RefreshPolicy::UserSession { margin } => lifetime.saturating_sub(*margin),
            RefreshPolicy::ServerWide {
                lifetime_fraction, ..
            } => lifetime.mul_f64(lifetime_fraction.clamp(0.0, 1.0)),
        }
    }

    /// Delay before retrying a failed refresh; `None` when failure is fatal
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            RefreshPolicy::UserSession { .. } => None,
            RefreshPolicy::ServerWide { retry_delay, .. } => Some(*retry_delay),
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::user_session()
    }
}

/// Owner of the vendor credential
///
/// Cloning shares the same credential. Scheduling needs a tokio runtime.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

struct Inner {
    credential: RwLock<Option<Credential>>,
    state: watch::Sender<CredentialState>,
    refresher: Arc<dyn TokenRefresher>,
    policy: RefreshPolicy,
    store: Option<FileCredentialStore>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CredentialManager {
    pub fn new(refresher: Arc<dyn TokenRefresher>, policy: RefreshPolicy) -> Self {
        Self::build(refresher, policy, None)
    }

    /// Manager that persists every credential change to `store`
    pub fn with_store(
        refresher: Arc<dyn TokenRefresher>,
        policy: RefreshPolicy,
        store: FileCredentialStore,
    ) -> Self {
        Self::build(refresher, policy, Some(store))
    }

    fn build(
        refresher: Arc<dyn TokenRefresher>,
        policy: RefreshPolicy,
        store: Option<FileCredentialStore>,
    ) -> Self {
        let (state, _) = watch::channel(CredentialState::Unauthenticated);
        Self {
            inner: Arc::new(Inner {
                credential: RwLock::new(None),
                state,
                refresher,
                policy,
                store,
                task: Mutex::new(None),
            }),
        }
    }

    /// Accept a grant from an authorization exchange and schedule its refresh
    pub async fn store(&self, grant: TokenGrant) {
        let lifetime = Duration::from_secs(grant.expires_in);
        self.inner.apply_grant(grant, None).await;
        info!(expires_in = lifetime.as_secs(), "Credential stored");
        self.schedule(self.inner.policy.refresh_delay(lifetime));
    }

    /// Fetch the first token now and keep refreshing
    ///
    /// For flows without user interaction (client credentials).
    pub fn start(&self) {
        self.schedule(Duration::ZERO);
    }

    /// Resume a session from a persisted refresh token
    ///
    /// Forces an immediate refresh; failure logs out.
    pub async fn restore(&self, refresh_token: String) -> Result<()> {
        self.cancel();
        self.inner.set_state(CredentialState::Refreshing);
        debug!("Restoring session, forcing refresh");

        match self.inner.refresher.refresh(Some(refresh_token.as_str())).await {
            Ok(grant) => {
                let lifetime = Duration::from_secs(grant.expires_in);
                self.inner.apply_grant(grant, Some(refresh_token)).await;
                info!("Session restored");
                self.schedule(self.inner.policy.refresh_delay(lifetime));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Could not restore session");
                self.inner.clear().await;
                Err(e)
            }
        }
    }

    /// Restore whatever the attached store holds
    ///
    /// Returns `true` when a usable credential was restored.
    pub async fn restore_from_store(&self) -> Result<bool> {
        let Some(store) = &self.inner.store else {
            return Ok(false);
        };
        let Some(credential) = store.load().await? else {
            return Ok(false);
        };

        if let Some(refresh_token) = credential.refresh_token.clone() {
            return self.restore(refresh_token).await.map(|()| true);
        }

        let now = now_epoch_ms();
        if credential.is_expired_at(now) {
            debug!("Stored credential expired");
            return Ok(false);
        }

        let remaining = credential.remaining(now);
        self.inner.set_credential(Some(credential)).await;
        self.inner.set_state(CredentialState::Authenticated);
        self.schedule(self.inner.policy.refresh_delay(remaining));
        Ok(true)
    }

    /// Drop the credential and stop refreshing
    pub async fn logout(&self) {
        self.cancel();
        self.inner.clear().await;
        info!("Logged out");
    }

    /// The backend refused the current access token
    ///
    /// A user session is logged out so the next command asks for a fresh
    /// login. A server-wide credential keeps its refresh schedule. Returns
    /// whether the credential was dropped.
    pub async fn credential_rejected(&self) -> bool {
        match self.inner.policy {
            RefreshPolicy::UserSession { .. } => {
                warn!("Access token rejected, ending user session");
                self.logout().await;
                true
            }
            RefreshPolicy::ServerWide { .. } => {
                debug!("Access token rejected, waiting for the next refresh");
                false
            }
        }
    }

    /// Current access token, never an expired one
    pub fn current_access_token(&self) -> Option<String> {
        self.inner.valid_token()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner
            .credential
            .read()
            .ok()
            .and_then(|c| c.clone())
    }

    pub fn state(&self) -> CredentialState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.inner.state.subscribe()
    }

    fn schedule(&self, first_delay: Duration) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                debug!(delay_secs = delay.as_secs(), "Token refresh scheduled");
                tokio::time::sleep(delay).await;

                let Some(inner) = weak.upgrade() else { break };
                match inner.refresh_once().await {
                    Some(next) => delay = next,
                    None => break,
                }
            }
        });

        if let Ok(mut task) = self.inner.task.lock() {
            if let Some(previous) = task.replace(handle) {
                previous.abort();
            }
        }
    }

    fn cancel(&self) {
        if let Ok(mut task) = self.inner.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl TokenProvider for CredentialManager {
    fn access_token(&self) -> Option<String> {
        self.current_access_token()
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("state", &self.state())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// One refresh attempt; returns the delay until the next one
    async fn refresh_once(&self) -> Option<Duration> {
        let previous_refresh = self
            .credential
            .read()
            .ok()
            .and_then(|c| c.as_ref().and_then(|c| c.refresh_token.clone()));
        self.set_state(CredentialState::Refreshing);

        match self.refresher.refresh(previous_refresh.as_deref()).await {
            Ok(grant) => {
                let lifetime = Duration::from_secs(grant.expires_in);
                self.apply_grant(grant, previous_refresh).await;
                info!(expires_in = lifetime.as_secs(), "Access token refreshed");
                Some(self.policy.refresh_delay(lifetime))
            }
            Err(e) => match self.policy.retry_delay() {
                Some(retry) => {
                    warn!(error = %e, retry_secs = retry.as_secs(), "Token refresh failed, retrying");
                    let state = if self.valid_token().is_some() {
                        CredentialState::Authenticated
                    } else {
                        CredentialState::Unauthenticated
                    };
                    self.set_state(state);
                    Some(retry)
                }
                None => {
                    warn!(error = %e, "Token refresh failed, logging out");
                    self.clear().await;
                    None
                }
            },
        }
    }

    async fn apply_grant(&self, grant: TokenGrant, fallback_refresh: Option<String>) {
        let mut credential = Credential::from_grant(&grant, now_epoch_ms());
        if credential.refresh_token.is_none() {
            credential.refresh_token = fallback_refresh;
        }
        self.set_credential(Some(credential)).await;
        self.set_state(CredentialState::Authenticated);
    }

    async fn clear(&self) {
        self.set_credential(None).await;
        self.set_state(CredentialState::Unauthenticated);
    }

    async fn set_credential(&self, credential: Option<Credential>) {
        if let Ok(mut slot) = self.credential.write() {
            *slot = credential.clone();
        }

        let Some(store) = &self.store else { return };
        let persisted = match &credential {
            Some(credential) => store.save(credential).await,
            None => store.clear().await,
        };
        if let Err(e) = persisted {
            warn!(error = %e, "Could not persist credential");
        }
    }

    fn valid_token(&self) -> Option<String> {
        let credential = self.credential.read().ok()?;
        credential
            .as_ref()
            .filter(|c| !c.is_expired())
            .map(|c| c.access_token.clone())
    }

    fn set_state(&self, state: CredentialState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Credential state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_session_refreshes_a_minute_early() {
        let policy = RefreshPolicy::user_session();
        assert_eq!(
            policy.refresh_delay(Duration::from_secs(3600)),
            Duration::from_secs(3540)
        );
        // Short-lived tokens refresh immediately
        assert_eq!(policy.refresh_delay(Duration::from_secs(30)), Duration::ZERO);
        assert!(policy.retry_delay().is_none());
    }

    #[test]
    fn test_server_wide_refreshes_at_ninety_percent() {
        let policy = RefreshPolicy::server_wide();
        assert_eq!(
            policy.refresh_delay(Duration::from_secs(3600)),
            Duration::from_secs(3240)
        );
        assert_eq!(policy.retry_delay(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_credential_expiry() {
        let grant = TokenGrant {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: 60,
        };
        let credential = Credential::from_grant(&grant, 1_000);

        assert_eq!(credential.expires_at_epoch_ms, 61_000);
        assert!(!credential.is_expired_at(60_999));
        assert!(credential.is_expired_at(61_000));
        assert_eq!(credential.remaining(31_000), Duration::from_secs(30));
        assert_eq!(credential.remaining(90_000), Duration::ZERO);
    }

    #[test]
    fn test_closure_token_provider() {
        let provider = || Some("token".to_string());
        assert_eq!(provider.access_token().as_deref(), Some("token"));
    }
}
