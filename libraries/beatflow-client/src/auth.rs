//! Authentication against the BeatFlow backend and the vendor accounts service.

use crate::client::{error_message, read_json, send_error};
use crate::error::{ClientError, Result};
use crate::types::{LocalSession, LoginRequest, RefreshRequest, RegisterRequest, TokenGrant, UserProfile};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

/// Authentication client for the BeatFlow backend.
pub struct AuthClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> AuthClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// Login with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<LocalSession> {
        let url = format!("{}/auth/login", self.base_url);
        debug!(url = %url, email = %email, "Attempting login");

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();

        if status.is_success() {
            let session: LocalSession = response.json().await.map_err(|e| {
                ClientError::ParseError(format!("Failed to parse login response: {}", e))
            })?;

            info!(username = %session.username, user_id = %session.id, "Login successful");
            Ok(session)
        } else if status.as_u16() == 400 || status.as_u16() == 401 {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Login failed: invalid credentials");
            Err(ClientError::AuthFailed(error_message(&error_text)))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message: error_message(&error_text),
            })
        }
    }

    /// Create a local account.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<LocalSession> {
        let url = format!("{}/auth/register", self.base_url);
        debug!(url = %url, username = %username, "Registering account");

        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();

        if status.is_success() {
            let session: LocalSession = response.json().await.map_err(|e| {
                ClientError::ParseError(format!("Failed to parse register response: {}", e))
            })?;

            info!(username = %session.username, user_id = %session.id, "Account created");
            Ok(session)
        } else if status.as_u16() == 400 {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::AuthFailed(error_message(&error_text)))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message: error_message(&error_text),
            })
        }
    }

    /// Get the current user using a local token.
    pub async fn me(&self, local_token: &str) -> Result<UserProfile> {
        let url = format!("{}/auth/me", self.base_url);
        debug!(url = %url, "Getting current user info");

        let response = self
            .http
            .get(&url)
            .bearer_auth(local_token)
            .send()
            .await
            .map_err(send_error)?;

        read_json(response, "user info").await
    }

    /// Refresh a per-user vendor access token through the backend.
    pub async fn refresh_user_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let url = format!("{}/spotify-auth/refresh", self.base_url);
        debug!(url = %url, "Refreshing vendor access token");

        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();

        if status.is_success() {
            let grant: TokenGrant = response.json().await.map_err(|e| {
                ClientError::ParseError(format!("Failed to parse refresh response: {}", e))
            })?;

            debug!(expires_in = grant.expires_in, "Token refresh successful");
            Ok(grant)
        } else if status.is_client_error() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token refresh failed: refresh token expired or invalid");
            Err(ClientError::TokenRefreshFailed(error_message(&error_text)))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message: error_message(&error_text),
            })
        }
    }
}

/// Client for the vendor accounts service token endpoint.
pub struct AccountsClient<'a> {
    http: &'a Client,
    base_url: &'a str,
}

impl<'a> AccountsClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str) -> Self {
        Self { http, base_url }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant> {
        debug!("Exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        let grant = self.token_request(&form, client_id, client_secret).await?;
        info!("Authorization code exchanged");
        Ok(grant)
    }

    /// Obtain an app-wide token with the client-credentials flow.
    pub async fn client_credentials(&self, client_id: &str, client_secret: &str) -> Result<TokenGrant> {
        debug!("Requesting client-credentials token");
        let form = [("grant_type", "client_credentials")];
        self.token_request(&form, client_id, client_secret).await
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant> {
        let url = format!("{}/api/token", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(form)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                ClientError::ParseError(format!("Failed to parse token response: {}", e))
            })
        } else if status.is_client_error() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token request refused");
            Err(ClientError::TokenRefreshFailed(error_message(&error_text)))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::ServerError {
                status: status.as_u16(),
                message: error_message(&error_text),
            })
        }
    }
}

/// Read the tokens the backend appends to the frontend redirect.
///
/// Returns `None` when the URL carries no complete token set, which is the
/// normal case for every page load that is not an authorization callback.
/// An `error` parameter (e.g. `?error=token_error`) is reported as
/// [`ClientError::AuthFailed`].
pub fn parse_redirect(redirect_url: &str) -> Result<Option<TokenGrant>> {
    let url = Url::parse(redirect_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "expires_in" => expires_in = Some(value.into_owned()),
            "error" => return Err(ClientError::AuthFailed(value.into_owned())),
            _ => {}
        }
    }

    let (Some(access_token), Some(refresh_token), Some(expires_in)) =
        (access_token, refresh_token, expires_in)
    else {
        return Ok(None);
    };

    let expires_in = expires_in
        .parse()
        .map_err(|_| ClientError::ParseError(format!("Invalid expires_in: {}", expires_in)))?;

    info!("Captured vendor tokens from redirect");
    Ok(Some(TokenGrant {
        access_token,
        refresh_token: Some(refresh_token),
        expires_in,
    }))
}
