//! Client-side session core.
//!
//! This crate provides:
//! - Password and second-factor login flows against a REST backend
//! - Credential lifecycle with single-flight token refresh
//! - Session restoration at startup from the credential vault
//! - Local `resource:action` permission evaluation over cached grants
//! - Linking and unlinking third-party identity providers
//! - A facade composing the above behind one surface

mod api;
mod bootstrap;
mod config;
mod error;
mod facade;
mod lifecycle;
mod linking;
mod permissions;
mod step_up;
mod types;

#[cfg(test)]
mod test_support;

pub use api::{AuthBackend, RestAuthClient};
pub use bootstrap::{Bootstrap, SessionBootstrapper};
pub use config::{CoreConfig, DEFAULT_REQUEST_TIMEOUT, OAUTH_CALLBACK_PATH};
pub use error::{AuthError, AuthResult};
pub use facade::{LoginAttempt, SessionFacade};
pub use lifecycle::{RefreshState, TokenLifecycle};
pub use linking::{parse_callback_url, LinkingFlow};
pub use permissions::{has_all_permissions, has_any_permission, has_permission, has_role};
pub use step_up::{StepUpFlow, StepUpPhase};
pub use types::{
    CredentialPair, LinkedIdentity, LoginOutcome, Principal, PrincipalUpdate, Provider,
    RegisterRequest, Role, StepUpChallenge, StepUpCode, StepUpMethod,
};
