//! Authentication error taxonomy.

use thiserror::Error;

/// Error type for session operations.
///
/// A login that requires a second factor is not an error; it surfaces as
/// [`crate::LoginOutcome::StepUpRequired`].
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Account locked out after repeated failures
    #[error("account locked: {0}")]
    AccountLocked(String),

    /// Step-up code rejected by the backend
    #[error("step-up code rejected: {0}")]
    InvalidStepUpCode(String),

    /// Backend-enforced rate limit; wait before retrying
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Stored credentials could not be refreshed; the session was cleared
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// OAuth callback state did not match the pending attempt
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// No usable session
    #[error("not authenticated")]
    NotAuthenticated,

    /// Client-side shape check failed; no request was issued
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation not allowed in the flow's current state
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Transport failure, including request timeouts
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Unexpected backend response
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
}

impl AuthError {
    /// True when the caller should wait before retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AuthError::RateLimited(_))
    }

    /// True for transport-class failures where an immediate retry may help.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
