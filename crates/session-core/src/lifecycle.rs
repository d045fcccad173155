//! Credential pair lifecycle: adoption, staleness checks, and refresh.
//!
//! Refresh is single-flight: one refresh per expiry, no matter how many
//! tasks notice the staleness at once. Everyone else waits on the gate and
//! picks up the pair the winner stored.

use crate::api::AuthBackend;
use crate::error::{AuthError, AuthResult};
use crate::types::CredentialPair;
use credential_vault::TokenStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Observable lifecycle state. At most one refresh is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

pub struct TokenLifecycle {
    backend: Arc<dyn AuthBackend>,
    store: Arc<TokenStore>,
    refresh_gate: Mutex<()>,
    refreshing: AtomicBool,
}

impl TokenLifecycle {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<TokenStore>) -> Self {
        Self {
            backend,
            store,
            refresh_gate: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RefreshState {
        if self.refreshing.load(Ordering::SeqCst) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Persist a newly issued pair (login, step-up, or code exchange).
    pub fn adopt(&self, pair: &CredentialPair) {
        self.store.save(pair);
    }

    /// The stored pair, fresh or not. `None` means signed out.
    pub fn current_pair(&self) -> Option<CredentialPair> {
        self.store.load()
    }

    /// Drop all stored credentials. Idempotent.
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_some()
    }

    /// An access token guaranteed fresh at the time of return, refreshing
    /// through the backend if the stored one is stale.
    ///
    /// Fails with `NotAuthenticated` when nothing is stored and
    /// `RefreshFailed` when the backend rejects the refresh token; the
    /// latter clears the store, so the next call starts signed out.
    pub async fn access_token(&self) -> AuthResult<String> {
        let pair = self.store.load().ok_or(AuthError::NotAuthenticated)?;
        if !self.store.is_stale(&pair) {
            return Ok(pair.access_token);
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> AuthResult<String> {
        let _guard = self.refresh_gate.lock().await;

        // Another task may have refreshed while we waited on the gate.
        let pair = self.store.load().ok_or(AuthError::NotAuthenticated)?;
        if !self.store.is_stale(&pair) {
            debug!("credential pair already refreshed by a concurrent task");
            return Ok(pair.access_token);
        }

        info!("access token stale, refreshing");
        self.refreshing.store(true, Ordering::SeqCst);
        let outcome = self.backend.refresh(&pair.refresh_token).await;
        self.refreshing.store(false, Ordering::SeqCst);

        match outcome {
            Ok(fresh) => {
                self.store.save(&fresh);
                info!("credential pair refreshed");
                Ok(fresh.access_token)
            }
            Err(err) => {
                // Callers see one RefreshFailed, never the raw cause. The
                // state is cleared so the session settles unauthenticated
                // instead of retrying against a rotated refresh token.
                warn!(error = %err, "refresh failed, clearing stored credentials");
                self.store.clear();
                Err(AuthError::RefreshFailed(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fresh_pair, stale_pair, MockBackend};
    use credential_vault::MemoryStore;
    use std::sync::atomic::Ordering;

    fn lifecycle_with(backend: Arc<MockBackend>) -> TokenLifecycle {
        let store = Arc::new(TokenStore::new(Box::new(MemoryStore::new())));
        TokenLifecycle::new(backend, store)
    }

    #[tokio::test]
    async fn fresh_token_returned_without_refresh() {
        let backend = Arc::new(MockBackend::new());
        let lifecycle = lifecycle_with(backend.clone());
        let pair = fresh_pair("t");
        lifecycle.adopt(&pair);

        let token = lifecycle.access_token().await.unwrap();
        assert_eq!(token, pair.access_token);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_token_triggers_refresh() {
        let backend = Arc::new(MockBackend::new());
        let lifecycle = lifecycle_with(backend.clone());
        let old = stale_pair("t");
        lifecycle.adopt(&old);

        let token = lifecycle.access_token().await.unwrap();
        assert_ne!(token, old.access_token);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        // Stored pair was replaced.
        let stored = lifecycle.current_pair().unwrap();
        assert_eq!(stored.access_token, token);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let backend = Arc::new(MockBackend::new());
        backend.refresh_delay_ms.store(20, Ordering::SeqCst);
        let lifecycle = Arc::new(lifecycle_with(backend.clone()));
        lifecycle.adopt(&stale_pair("t"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lifecycle = lifecycle.clone();
            handles.push(tokio::spawn(async move { lifecycle.access_token().await }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(tokens.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_store() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_refresh.store(true, Ordering::SeqCst);
        let lifecycle = lifecycle_with(backend.clone());
        lifecycle.adopt(&stale_pair("t"));

        let err = lifecycle.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert!(lifecycle.current_pair().is_none());

        // The pair is gone, so the next call never reaches the backend.
        let err = lifecycle.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_store_is_not_authenticated() {
        let lifecycle = lifecycle_with(Arc::new(MockBackend::new()));
        assert!(!lifecycle.is_authenticated());
        let err = lifecycle.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn refreshing_state_is_observable() {
        let backend = Arc::new(MockBackend::new());
        backend.refresh_delay_ms.store(50, Ordering::SeqCst);
        let lifecycle = Arc::new(lifecycle_with(backend));
        lifecycle.adopt(&stale_pair("t"));
        assert_eq!(lifecycle.state(), RefreshState::Idle);

        let task = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.access_token().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(lifecycle.state(), RefreshState::Refreshing);

        task.await.unwrap().unwrap();
        assert_eq!(lifecycle.state(), RefreshState::Idle);
    }
}
