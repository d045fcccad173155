//! The token store: owner of the current credential pair.

use crate::{SecureStore, StoreKeys};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed storage horizon for the refresh token entry. The refresh token's
/// true lifetime is authoritative server-side; this only bounds how long a
/// dormant session survives locally.
pub const REFRESH_HORIZON: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How long a pending OAuth link state stays valid.
const LINK_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// A token is treated as stale once it is within this margin of its expiry.
const STALENESS_MARGIN_SECS: i64 = 60;

/// Access + refresh token bundle as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access-token lifetime hint in seconds, captured at issuance.
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Session metadata artifact stored alongside the tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub token_type: String,
    pub expires_in: i64,
    /// When the pair was persisted (RFC 3339).
    pub issued_at: String,
}

/// Persists and retrieves the current credential pair.
///
/// Storage and decoding failures are recovered locally: a pair that cannot
/// be read counts as absent, a token that cannot be decoded counts as stale.
/// Callers never see raw storage errors.
pub struct TokenStore {
    store: Box<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(store: Box<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// Persist a credential pair.
    ///
    /// The access token entry lapses with its own lifetime hint; the refresh
    /// token entry gets the fixed one-week horizon.
    pub fn save(&self, pair: &CredentialPair) {
        let access_ttl = Duration::from_secs(pair.expires_in.max(0) as u64);
        if let Err(e) =
            self.store
                .set_expiring(StoreKeys::ACCESS_TOKEN, &pair.access_token, access_ttl)
        {
            tracing::warn!(error = %e, "failed to persist access token");
        }
        if let Err(e) = self.store.set_expiring(
            StoreKeys::REFRESH_TOKEN,
            &pair.refresh_token,
            REFRESH_HORIZON,
        ) {
            tracing::warn!(error = %e, "failed to persist refresh token");
        }

        let meta = SessionMeta {
            token_type: pair.token_type.clone(),
            expires_in: pair.expires_in,
            issued_at: Utc::now().to_rfc3339(),
        };
        match serde_json::to_string(&meta) {
            Ok(json) => {
                if let Err(e) = self
                    .store
                    .set_expiring(StoreKeys::SESSION_META, &json, REFRESH_HORIZON)
                {
                    tracing::warn!(error = %e, "failed to persist session metadata");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode session metadata"),
        }
    }

    /// Load the stored credential pair, if any.
    ///
    /// Returns `Some` as long as the refresh token entry survives. An access
    /// token entry that lapsed in storage reads back empty, which `is_stale`
    /// then treats as stale.
    pub fn load(&self) -> Option<CredentialPair> {
        let refresh_token = match self.store.get(StoreKeys::REFRESH_TOKEN) {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read refresh token, treating as absent");
                return None;
            }
        };

        let access_token = match self.store.get(StoreKeys::ACCESS_TOKEN) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read access token, treating as lapsed");
                String::new()
            }
        };

        let meta = self.load_meta();
        Some(CredentialPair {
            access_token,
            refresh_token,
            token_type: meta
                .as_ref()
                .map(|m| m.token_type.clone())
                .unwrap_or_else(default_token_type),
            expires_in: meta.map(|m| m.expires_in).unwrap_or(0),
        })
    }

    fn load_meta(&self) -> Option<SessionMeta> {
        match self.store.get(StoreKeys::SESSION_META) {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            _ => None,
        }
    }

    /// Remove both tokens and the session metadata artifact. Idempotent.
    pub fn clear(&self) {
        let _ = self.store.delete(StoreKeys::ACCESS_TOKEN);
        let _ = self.store.delete(StoreKeys::REFRESH_TOKEN);
        let _ = self.store.delete(StoreKeys::SESSION_META);
    }

    /// Whether a pair's access token should be refreshed.
    ///
    /// Decodes the access token's `exp` claim without signature validation;
    /// the value is a staleness hint, never a trust decision. Anything
    /// unreadable counts as stale.
    pub fn is_stale(&self, pair: &CredentialPair) -> bool {
        match decode_expiry(&pair.access_token) {
            Some(expires_at) => {
                expires_at.signed_duration_since(Utc::now()).num_seconds() < STALENESS_MARGIN_SECS
            }
            None => true,
        }
    }

    // ==========================================
    // Pending OAuth link state
    // ==========================================

    /// Persist the expected OAuth `state` for a pending link attempt.
    pub fn set_link_state(&self, provider: &str, state: &str) {
        if let Err(e) =
            self.store
                .set_expiring(&StoreKeys::oauth_state(provider), state, LINK_STATE_TTL)
        {
            tracing::warn!(provider = %provider, error = %e, "failed to persist link state");
        }
    }

    /// Consume the expected OAuth `state` for a provider, if one is pending.
    pub fn take_link_state(&self, provider: &str) -> Option<String> {
        let key = StoreKeys::oauth_state(provider);
        let state = match self.store.get(&key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "failed to read link state");
                None
            }
        };
        let _ = self.store.delete(&key);
        state
    }
}

/// Decode the `exp` claim from a JWT access token without verifying it.
fn decode_expiry(access_token: &str) -> Option<DateTime<Utc>> {
    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}
