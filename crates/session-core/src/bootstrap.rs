//! Session restoration at process start.
//!
//! The bootstrapper decides, from whatever survived in the vault, whether
//! the process starts signed in. A stale pair gets one refresh attempt.
//! If the authoritative fetch fails after that, the credentials are
//! discarded: a stale local snapshot is worse than none.

use crate::api::AuthBackend;
use crate::error::AuthError;
use crate::lifecycle::TokenLifecycle;
use crate::types::Principal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// What session restoration concluded.
#[derive(Debug, Clone)]
pub enum Bootstrap {
    SignedOut,
    SignedIn {
        principal: Principal,
        permissions: HashSet<String>,
    },
}

pub struct SessionBootstrapper {
    backend: Arc<dyn AuthBackend>,
    lifecycle: Arc<TokenLifecycle>,
}

impl SessionBootstrapper {
    pub fn new(backend: Arc<dyn AuthBackend>, lifecycle: Arc<TokenLifecycle>) -> Self {
        Self { backend, lifecycle }
    }

    /// Restore the session from stored credentials, validating them
    /// against the backend.
    pub async fn run(&self) -> Bootstrap {
        let access_token = match self.lifecycle.access_token().await {
            Ok(token) => token,
            Err(AuthError::NotAuthenticated) => {
                info!("no stored session, starting signed out");
                return Bootstrap::SignedOut;
            }
            Err(err) => {
                warn!(error = %err, "stored session could not be refreshed");
                return Bootstrap::SignedOut;
            }
        };

        let principal = match self.backend.current_principal(&access_token).await {
            Ok(principal) => principal,
            Err(err) => {
                warn!(error = %err, "principal fetch failed, discarding credentials");
                self.lifecycle.clear();
                return Bootstrap::SignedOut;
            }
        };

        let permissions = match self.backend.permissions(&access_token).await {
            Ok(permissions) => permissions,
            Err(err) => {
                warn!(error = %err, "permission fetch failed, discarding credentials");
                self.lifecycle.clear();
                return Bootstrap::SignedOut;
            }
        };

        info!(principal = %principal.email, "session restored");
        Bootstrap::SignedIn {
            principal,
            permissions,
        }
    }
}
