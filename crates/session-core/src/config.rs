//! Configuration for the session core.

use std::time::Duration;

/// Default overall deadline for a single backend request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Path appended to the base address for OAuth redirects.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Construction-time configuration for the session core.
///
/// This core is library-level: the backend base address and the request
/// timeout are the entire configuration surface.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Backend base address, e.g. `https://auth.example.com`.
    pub base_url: String,
    /// Overall deadline applied to every backend request.
    pub request_timeout: Duration,
}

impl CoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The fixed redirect URI providers send the browser back to.
    pub fn redirect_uri(&self) -> String {
        format!("{}{}", self.base_url, OAUTH_CALLBACK_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let config = CoreConfig::new("https://auth.example.com/");
        assert_eq!(config.base_url, "https://auth.example.com");
        assert_eq!(
            config.redirect_uri(),
            "https://auth.example.com/auth/callback"
        );
    }

    #[test]
    fn timeout_override() {
        let config = CoreConfig::new("https://auth.example.com")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
