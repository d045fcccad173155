//! Storage key constants.

/// Storage keys used by the token store.
pub struct StoreKeys;

impl StoreKeys {
    /// Access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Session metadata (JSON)
    pub const SESSION_META: &'static str = "session_meta";

    /// Pending OAuth link state for a provider.
    pub fn oauth_state(provider: &str) -> String {
        format!("oauth_state_{}", provider)
    }
}
