//! Linking third-party provider accounts to the signed-in principal.
//!
//! The flow owns the CSRF state for the authorization round trip: `begin`
//! mints and stores it, `complete` consumes it before the code ever goes
//! to the backend. A state entry is single-use and lapses on its own if
//! the round trip is abandoned.

use crate::api::AuthBackend;
use crate::config::CoreConfig;
use crate::error::{AuthError, AuthResult};
use crate::lifecycle::TokenLifecycle;
use crate::types::{CredentialPair, LinkedIdentity, Provider};
use credential_vault::TokenStore;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Length of the random CSRF state, matching 32 bytes of url-safe entropy.
const STATE_LEN: usize = 43;

/// Pull `code` and `state` out of the URL a provider redirected back to.
pub fn parse_callback_url(callback_url: &str) -> AuthResult<(String, String)> {
    let parsed = Url::parse(callback_url)
        .map_err(|err| AuthError::Validation(format!("invalid callback URL: {err}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(AuthError::Validation(
            "callback URL is missing code or state".to_string(),
        )),
    }
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

pub struct LinkingFlow {
    backend: Arc<dyn AuthBackend>,
    lifecycle: Arc<TokenLifecycle>,
    store: Arc<TokenStore>,
    config: CoreConfig,
}

impl LinkingFlow {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        lifecycle: Arc<TokenLifecycle>,
        store: Arc<TokenStore>,
        config: CoreConfig,
    ) -> Self {
        Self {
            backend,
            lifecycle,
            store,
            config,
        }
    }

    /// Start linking `provider`: mint a CSRF state, stash it, and return
    /// the authorization URL to open in the browser.
    pub async fn begin(&self, provider: Provider) -> AuthResult<String> {
        let access_token = self.lifecycle.access_token().await?;
        let state = generate_state();
        self.store.set_link_state(provider.as_str(), &state);

        let url = self
            .backend
            .oauth_authorize_url(
                &access_token,
                provider,
                &state,
                &self.config.redirect_uri(),
            )
            .await?;
        info!(provider = %provider, "linking flow started");
        Ok(url)
    }

    /// Finish linking with the code and state returned to the callback.
    ///
    /// The stored state is consumed before comparison, so a mismatched
    /// attempt also burns it; the caller must `begin` again. The code is
    /// only exchanged after the state checks out.
    pub async fn complete(
        &self,
        provider: Provider,
        code: &str,
        returned_state: &str,
    ) -> AuthResult<CredentialPair> {
        let expected = self.store.take_link_state(provider.as_str());
        match expected {
            Some(stored) if stored == returned_state => {}
            _ => {
                warn!(provider = %provider, "authorization state mismatch");
                return Err(AuthError::StateMismatch);
            }
        }

        let access_token = self.lifecycle.access_token().await?;
        let pair = self
            .backend
            .oauth_callback(
                &access_token,
                provider,
                code,
                returned_state,
                &self.config.redirect_uri(),
            )
            .await?;
        info!(provider = %provider, "identity linked");
        Ok(pair)
    }

    /// List the provider accounts currently linked.
    pub async fn linked(&self) -> AuthResult<Vec<LinkedIdentity>> {
        let access_token = self.lifecycle.access_token().await?;
        self.backend.linked_identities(&access_token).await
    }

    /// Remove a linked provider account. Unlinking is destructive, so the
    /// caller must pass explicit confirmation; an unconfirmed request is
    /// rejected without a network call.
    pub async fn unlink(&self, provider: Provider, confirmed: bool) -> AuthResult<()> {
        if !confirmed {
            return Err(AuthError::Validation(
                "unlinking requires explicit confirmation".to_string(),
            ));
        }
        let access_token = self.lifecycle.access_token().await?;
        self.backend.unlink_identity(&access_token, provider).await?;
        info!(provider = %provider, "identity unlinked");
        Ok(())
    }
}
