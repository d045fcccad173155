//! Backend interface and its REST implementation.
//!
//! `AuthBackend` is the abstract boundary with the authorization backend;
//! `RestAuthClient` implements it over HTTP. Tests substitute scripted
//! implementations of the trait.

use crate::config::CoreConfig;
use crate::error::{AuthError, AuthResult};
use crate::types::{
    CredentialPair, LinkedIdentity, LoginOutcome, Principal, PrincipalUpdate, Provider,
    RegisterRequest, StepUpChallenge, StepUpMethod,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Abstract interface to the authorization backend.
///
/// All verification and policy enforcement happens server-side; this core
/// only drives the client flow.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Password login. Returns either a credential pair or a step-up
    /// challenge; the caller must branch on the shape.
    async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome>;

    /// Create a new account and sign it in.
    async fn register(&self, request: &RegisterRequest) -> AuthResult<CredentialPair>;

    /// Exchange a refresh token for a new credential pair.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<CredentialPair>;

    /// Consume a step-up challenge with a second-factor code.
    async fn verify_step_up(
        &self,
        challenge: &StepUpChallenge,
        code: &str,
        method: StepUpMethod,
    ) -> AuthResult<CredentialPair>;

    /// Fetch the authoritative principal record.
    async fn current_principal(&self, access_token: &str) -> AuthResult<Principal>;

    /// Fetch the granted permission strings for the current principal.
    async fn permissions(&self, access_token: &str) -> AuthResult<HashSet<String>>;

    /// Update profile fields; returns the refreshed principal.
    async fn update_principal(
        &self,
        access_token: &str,
        update: &PrincipalUpdate,
    ) -> AuthResult<Principal>;

    /// Invalidate the session server-side.
    async fn logout(&self, access_token: &str) -> AuthResult<()>;

    /// Request an authorization URL for linking a provider, carrying the
    /// caller-generated `state`.
    async fn oauth_authorize_url(
        &self,
        access_token: &str,
        provider: Provider,
        state: &str,
        redirect_uri: &str,
    ) -> AuthResult<String>;

    /// Exchange an authorization code returned to the callback path.
    async fn oauth_callback(
        &self,
        access_token: &str,
        provider: Provider,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> AuthResult<CredentialPair>;

    /// List the provider accounts linked to the current principal.
    async fn linked_identities(&self, access_token: &str) -> AuthResult<Vec<LinkedIdentity>>;

    /// Remove a linked provider account.
    async fn unlink_identity(&self, access_token: &str, provider: Provider) -> AuthResult<()>;
}

// ==========================================
// Wire DTOs
// ==========================================

#[derive(Debug, Deserialize)]
struct TokenWire {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenWire> for CredentialPair {
    fn from(wire: TokenWire) -> Self {
        CredentialPair {
            access_token: wire.access_token,
            refresh_token: wire.refresh_token,
            token_type: wire.token_type,
            expires_in: wire.expires_in,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginWire {
    #[serde(default)]
    requires_2fa: bool,
    #[serde(default)]
    temp_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct AuthorizeUrlWire {
    authorization_url: String,
}

/// Pull the human-readable detail out of an error body, if present.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }
    serde_json::from_str::<Detail>(body)
        .map(|d| d.detail)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// REST implementation of `AuthBackend`.
pub struct RestAuthClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl RestAuthClient {
    /// Build a client with the configured base address and request deadline.
    pub fn new(config: &CoreConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Map a non-success response into the error taxonomy.
    ///
    /// `unauthorized` decides what a 401/403 means in the calling context
    /// (bad password, rejected code, dead refresh token).
    async fn classify(
        response: reqwest::Response,
        unauthorized: fn(String) -> AuthError,
    ) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        warn!(status = %status, detail = %detail, "backend request failed");

        match status.as_u16() {
            401 | 403 => unauthorized(detail),
            423 => AuthError::AccountLocked(detail),
            429 => AuthError::RateLimited(detail),
            _ => AuthError::Server {
                status: status.as_u16(),
                body: detail,
            },
        }
    }
}

#[async_trait]
impl AuthBackend for RestAuthClient {
    async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        let url = self.api_url("/auth/login");
        debug!(url = %url, "attempting password login");

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response, AuthError::InvalidCredentials).await);
        }

        let wire: LoginWire = response.json().await?;
        if wire.requires_2fa {
            let token = wire.temp_token.ok_or(AuthError::Server {
                status: 200,
                body: "step-up required but no challenge handle supplied".to_string(),
            })?;
            return Ok(LoginOutcome::StepUpRequired(StepUpChallenge { token }));
        }

        match (wire.access_token, wire.refresh_token) {
            (Some(access_token), Some(refresh_token)) => {
                Ok(LoginOutcome::Session(CredentialPair {
                    access_token,
                    refresh_token,
                    token_type: wire.token_type,
                    expires_in: wire.expires_in,
                }))
            }
            _ => Err(AuthError::Server {
                status: 200,
                body: "login response carried neither tokens nor a challenge".to_string(),
            }),
        }
    }

    async fn register(&self, request: &RegisterRequest) -> AuthResult<CredentialPair> {
        let url = self.api_url("/auth/register");
        debug!(url = %url, "registering new account");

        let response = self.http_client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(Self::classify(response, AuthError::Validation).await);
        }

        let wire: TokenWire = response.json().await?;
        Ok(wire.into())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<CredentialPair> {
        let url = self.api_url("/auth/refresh");
        debug!(url = %url, "refreshing credential pair");

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response, |detail| AuthError::RefreshFailed(detail)).await);
        }

        let wire: TokenWire = response.json().await?;
        Ok(wire.into())
    }

    async fn verify_step_up(
        &self,
        challenge: &StepUpChallenge,
        code: &str,
        method: StepUpMethod,
    ) -> AuthResult<CredentialPair> {
        let url = self.api_url("/auth/2fa/login-verify");
        debug!(url = %url, method = ?method, "verifying step-up code");

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "temp_token": challenge.token,
                "code": code,
                "is_backup": method == StepUpMethod::Backup,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response, AuthError::InvalidStepUpCode).await);
        }

        let wire: TokenWire = response.json().await?;
        Ok(wire.into())
    }

    async fn current_principal(&self, access_token: &str) -> AuthResult<Principal> {
        let url = self.api_url("/auth/me");
        debug!(url = %url, "fetching current principal");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }

        Ok(response.json().await?)
    }

    async fn permissions(&self, access_token: &str) -> AuthResult<HashSet<String>> {
        let url = self.api_url("/auth/me/permissions");
        debug!(url = %url, "fetching granted permissions");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }

        Ok(response.json().await?)
    }

    async fn update_principal(
        &self,
        access_token: &str,
        update: &PrincipalUpdate,
    ) -> AuthResult<Principal> {
        let url = self.api_url("/auth/me");
        debug!(url = %url, "updating principal profile");

        let response = self
            .http_client
            .patch(&url)
            .bearer_auth(access_token)
            .json(update)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response, AuthError::Validation).await);
        }

        Ok(response.json().await?)
    }

    async fn logout(&self, access_token: &str) -> AuthResult<()> {
        let url = self.api_url("/auth/logout");
        debug!(url = %url, "logging out server-side");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }
        Ok(())
    }

    async fn oauth_authorize_url(
        &self,
        access_token: &str,
        provider: Provider,
        state: &str,
        redirect_uri: &str,
    ) -> AuthResult<String> {
        let url = self.api_url(&format!("/oauth/{}/init", provider));
        debug!(url = %url, provider = %provider, "requesting authorization URL");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("state", state), ("redirect_uri", redirect_uri)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }

        let wire: AuthorizeUrlWire = response.json().await?;
        Ok(wire.authorization_url)
    }

    async fn oauth_callback(
        &self,
        access_token: &str,
        provider: Provider,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> AuthResult<CredentialPair> {
        let url = self.api_url(&format!("/oauth/{}/callback", provider));
        debug!(url = %url, provider = %provider, "exchanging authorization code");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "code": code,
                "state": state,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }

        let wire: TokenWire = response.json().await?;
        Ok(wire.into())
    }

    async fn linked_identities(&self, access_token: &str) -> AuthResult<Vec<LinkedIdentity>> {
        let url = self.api_url("/oauth/linked");
        debug!(url = %url, "fetching linked identities");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }

        Ok(response.json().await?)
    }

    async fn unlink_identity(&self, access_token: &str, provider: Provider) -> AuthResult<()> {
        let url = self.api_url(&format!("/oauth/{}/unlink", provider));
        debug!(url = %url, provider = %provider, "unlinking identity");

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                Self::classify(response, |_| AuthError::NotAuthenticated).await,
            );
        }
        Ok(())
    }
}
