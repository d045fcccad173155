//! Single entry point for applications.
//!
//! `SessionFacade` composes the vault, the lifecycle manager, the
//! bootstrapper, and the linking flow behind one surface, and caches the
//! session snapshot (principal, grants, linked identities) that the
//! permission queries answer from.

use crate::api::{AuthBackend, RestAuthClient};
use crate::bootstrap::{Bootstrap, SessionBootstrapper};
use crate::config::CoreConfig;
use crate::error::AuthResult;
use crate::lifecycle::TokenLifecycle;
use crate::linking::LinkingFlow;
use crate::permissions;
use crate::step_up::StepUpFlow;
use crate::types::{
    CredentialPair, LinkedIdentity, LoginOutcome, Principal, PrincipalUpdate, Provider,
    RegisterRequest,
};
use credential_vault::TokenStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Cached session snapshot. Replaced wholesale on every hydration so
/// readers never observe a half-updated session.
#[derive(Default)]
struct SessionState {
    principal: Option<Principal>,
    permissions: HashSet<String>,
    linked: Vec<LinkedIdentity>,
}

/// What a login attempt produced.
#[derive(Debug)]
pub enum LoginAttempt {
    SignedIn(Principal),
    /// A second factor is required; drive the returned flow to completion
    /// and hand its credential pair to `complete_step_up`.
    StepUpRequired(StepUpFlow),
}

pub struct SessionFacade {
    backend: Arc<dyn AuthBackend>,
    lifecycle: Arc<TokenLifecycle>,
    linking: LinkingFlow,
    state: Mutex<SessionState>,
    loading: AtomicBool,
}

impl SessionFacade {
    /// Build a facade talking to the configured backend over REST.
    pub fn new(config: CoreConfig, store: TokenStore) -> AuthResult<Self> {
        let backend: Arc<dyn AuthBackend> = Arc::new(RestAuthClient::new(&config)?);
        Ok(Self::with_backend(backend, store, config))
    }

    /// Build a facade over an arbitrary backend implementation.
    pub fn with_backend(
        backend: Arc<dyn AuthBackend>,
        store: TokenStore,
        config: CoreConfig,
    ) -> Self {
        let store = Arc::new(store);
        let lifecycle = Arc::new(TokenLifecycle::new(backend.clone(), store.clone()));
        let linking = LinkingFlow::new(backend.clone(), lifecycle.clone(), store, config);
        Self {
            backend,
            lifecycle,
            linking,
            state: Mutex::new(SessionState::default()),
            loading: AtomicBool::new(false),
        }
    }

    // ==========================================
    // Queries
    // ==========================================

    /// Whether session restoration is still in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().principal.is_some()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state.lock().unwrap().principal.clone()
    }

    /// Whether the session holds `permission` (`resource:action`).
    /// Denies while signed out or still loading.
    pub fn has_permission(&self, permission: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.principal.is_some() && permissions::has_permission(&state.permissions, permission)
    }

    pub fn has_any_permission(&self, queries: &[&str]) -> bool {
        let state = self.state.lock().unwrap();
        state.principal.is_some() && permissions::has_any_permission(&state.permissions, queries)
    }

    pub fn has_all_permissions(&self, queries: &[&str]) -> bool {
        let state = self.state.lock().unwrap();
        state.principal.is_some() && permissions::has_all_permissions(&state.permissions, queries)
    }

    pub fn has_role(&self, role: &str) -> bool {
        let state = self.state.lock().unwrap();
        match &state.principal {
            Some(principal) => permissions::has_role(&principal.role_names(), role),
            None => false,
        }
    }

    pub fn linked_identities(&self) -> Vec<LinkedIdentity> {
        self.state.lock().unwrap().linked.clone()
    }

    // ==========================================
    // Lifecycle
    // ==========================================

    /// Restore the session from stored credentials. Queries made while
    /// this runs see `is_loading` and deny.
    pub async fn bootstrap(&self) {
        self.loading.store(true, Ordering::SeqCst);
        let outcome = SessionBootstrapper::new(self.backend.clone(), self.lifecycle.clone())
            .run()
            .await;
        match outcome {
            Bootstrap::SignedIn {
                principal,
                permissions,
            } => {
                self.install(principal, permissions);
            }
            Bootstrap::SignedOut => {
                self.reset();
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Password login. Either signs in directly or hands back a step-up
    /// flow to finish with a second factor.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginAttempt> {
        match self.backend.login(email, password).await? {
            LoginOutcome::Session(pair) => {
                let principal = self.adopt_and_hydrate(&pair).await?;
                info!(principal = %principal.email, "signed in");
                Ok(LoginAttempt::SignedIn(principal))
            }
            LoginOutcome::StepUpRequired(challenge) => {
                info!("login requires a second factor");
                Ok(LoginAttempt::StepUpRequired(StepUpFlow::new(
                    self.backend.clone(),
                    challenge,
                )))
            }
        }
    }

    /// Adopt the credential pair a completed step-up flow produced.
    pub async fn complete_step_up(&self, pair: CredentialPair) -> AuthResult<Principal> {
        let principal = self.adopt_and_hydrate(&pair).await?;
        info!(principal = %principal.email, "signed in after step-up");
        Ok(principal)
    }

    /// Create an account and sign it in. Shape problems are rejected
    /// locally before the request goes out.
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<Principal> {
        request.validate()?;
        let pair = self.backend.register(request).await?;
        let principal = self.adopt_and_hydrate(&pair).await?;
        info!(principal = %principal.email, "account registered");
        Ok(principal)
    }

    /// Sign out. The server-side invalidation is best effort; local
    /// credentials and cached state are dropped no matter what.
    pub async fn logout(&self) {
        if let Some(pair) = self.lifecycle.current_pair() {
            if let Err(err) = self.backend.logout(&pair.access_token).await {
                warn!(error = %err, "server-side logout failed, clearing locally anyway");
            }
        }
        self.lifecycle.clear();
        self.reset();
        info!("signed out");
    }

    /// Refetch the principal and grants from the backend, replacing the
    /// cached snapshot.
    pub async fn refresh_session(&self) -> AuthResult<Principal> {
        self.hydrate().await
    }

    /// Update profile fields, then refetch the principal and grants so
    /// the cache reflects whatever the change rippled into.
    pub async fn update_profile(&self, update: &PrincipalUpdate) -> AuthResult<Principal> {
        let access_token = self.lifecycle.access_token().await?;
        self.backend.update_principal(&access_token, update).await?;
        self.hydrate().await
    }

    // ==========================================
    // Identity linking
    // ==========================================

    /// Start linking `provider`; returns the authorization URL to open.
    pub async fn begin_link(&self, provider: Provider) -> AuthResult<String> {
        self.linking.begin(provider).await
    }

    /// Finish linking with the callback's code and state, then refresh
    /// the cached linked-identity list.
    pub async fn complete_link(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> AuthResult<()> {
        let pair = self.linking.complete(provider, code, state).await?;
        self.lifecycle.adopt(&pair);
        if let Err(err) = self.refresh_linked().await {
            warn!(error = %err, "linked identity refresh failed, cache is stale");
        }
        Ok(())
    }

    /// Remove a linked provider account. Requires explicit confirmation.
    pub async fn unlink(&self, provider: Provider, confirmed: bool) -> AuthResult<()> {
        self.linking.unlink(provider, confirmed).await?;
        if let Err(err) = self.refresh_linked().await {
            warn!(error = %err, "linked identity refresh failed, cache is stale");
        }
        Ok(())
    }

    /// Refetch the linked-identity list into the cache.
    pub async fn refresh_linked(&self) -> AuthResult<()> {
        let linked = self.linking.linked().await?;
        self.state.lock().unwrap().linked = linked;
        Ok(())
    }

    // ==========================================
    // Internals
    // ==========================================

    /// Persist a freshly issued pair and hydrate the session from it.
    ///
    /// If hydration fails the pair is discarded again, so an operation
    /// that reports failure leaves the vault exactly as signed out as it
    /// found it; a later bootstrap must not resurrect the session.
    async fn adopt_and_hydrate(&self, pair: &CredentialPair) -> AuthResult<Principal> {
        self.lifecycle.adopt(pair);
        match self.hydrate().await {
            Ok(principal) => Ok(principal),
            Err(err) => {
                warn!(error = %err, "session hydration failed, discarding adopted credentials");
                self.lifecycle.clear();
                Err(err)
            }
        }
    }

    async fn hydrate(&self) -> AuthResult<Principal> {
        let access_token = self.lifecycle.access_token().await?;
        let principal = self.backend.current_principal(&access_token).await?;
        let permissions = self.backend.permissions(&access_token).await?;
        self.install(principal.clone(), permissions);
        Ok(principal)
    }

    fn install(&self, principal: Principal, permissions: HashSet<String>) {
        let mut state = self.state.lock().unwrap();
        state.principal = Some(principal);
        state.permissions = permissions;
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = SessionState::default();
    }
}
