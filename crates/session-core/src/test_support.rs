//! Shared fixtures for crate tests: canned tokens, principals, and a
//! scripted `AuthBackend`.

use crate::api::AuthBackend;
use crate::error::{AuthError, AuthResult};
use crate::types::{
    CredentialPair, LinkedIdentity, LoginOutcome, Principal, PrincipalUpdate, Provider,
    RegisterRequest, Role, StepUpChallenge, StepUpMethod,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Build an unsigned JWT-shaped token whose payload carries `exp`.
pub(crate) fn token_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// A pair whose access token is valid for another 15 minutes.
pub(crate) fn fresh_pair(tag: &str) -> CredentialPair {
    CredentialPair {
        access_token: token_with_exp(chrono::Utc::now().timestamp() + 900),
        refresh_token: format!("refresh-{tag}"),
        token_type: "bearer".to_string(),
        expires_in: 900,
    }
}

/// A pair whose access token expired a minute ago but whose refresh token
/// is still good.
pub(crate) fn stale_pair(tag: &str) -> CredentialPair {
    CredentialPair {
        access_token: token_with_exp(chrono::Utc::now().timestamp() - 60),
        refresh_token: format!("refresh-{tag}"),
        token_type: "bearer".to_string(),
        expires_in: 900,
    }
}

pub(crate) fn principal_with_roles(role_names: &[&str]) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        email: "alice@example.com".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Arnold".to_string(),
        is_active: true,
        is_verified: true,
        is_superuser: false,
        created_at: None,
        last_login: None,
        roles: role_names
            .iter()
            .map(|name| Role {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: None,
                is_active: true,
                permissions: Vec::new(),
            })
            .collect(),
    }
}

/// Scripted backend. Flags flip behavior per call site; counters record
/// how often each endpoint was hit.
pub(crate) struct MockBackend {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub principal_calls: AtomicUsize,
    pub permission_calls: AtomicUsize,
    pub authorize_calls: AtomicUsize,
    pub callback_calls: AtomicUsize,
    pub linked_calls: AtomicUsize,
    pub unlink_calls: AtomicUsize,

    pub fail_login: AtomicBool,
    pub require_step_up: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_logout: AtomicBool,
    pub reject_code: AtomicBool,
    pub rate_limit_verify: AtomicBool,
    pub lock_verify: AtomicBool,
    pub reject_access: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub principal_delay_ms: AtomicU64,

    pub granted: Mutex<HashSet<String>>,
    pub linked: Mutex<Vec<LinkedIdentity>>,
    pub principal: Mutex<Principal>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            principal_calls: AtomicUsize::new(0),
            permission_calls: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
            callback_calls: AtomicUsize::new(0),
            linked_calls: AtomicUsize::new(0),
            unlink_calls: AtomicUsize::new(0),
            fail_login: AtomicBool::new(false),
            require_step_up: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            reject_code: AtomicBool::new(false),
            rate_limit_verify: AtomicBool::new(false),
            lock_verify: AtomicBool::new(false),
            reject_access: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            principal_delay_ms: AtomicU64::new(0),
            granted: Mutex::new(HashSet::new()),
            linked: Mutex::new(Vec::new()),
            principal: Mutex::new(principal_with_roles(&["member"])),
        }
    }

    pub fn grant(&self, permissions: &[&str]) {
        let mut granted = self.granted.lock().unwrap();
        for permission in permissions {
            granted.insert(permission.to_string());
        }
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn login(&self, _email: &str, _password: &str) -> AuthResult<LoginOutcome> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidCredentials(
                "invalid email or password".to_string(),
            ));
        }
        if self.require_step_up.load(Ordering::SeqCst) {
            return Ok(LoginOutcome::StepUpRequired(StepUpChallenge {
                token: "temp-token-1".to_string(),
            }));
        }
        Ok(LoginOutcome::Session(fresh_pair("login")))
    }

    async fn register(&self, _request: &RegisterRequest) -> AuthResult<CredentialPair> {
        Ok(fresh_pair("register"))
    }

    async fn refresh(&self, _refresh_token: &str) -> AuthResult<CredentialPair> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.refresh_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::RefreshFailed("refresh token revoked".to_string()));
        }
        Ok(fresh_pair(&format!("r{call}")))
    }

    async fn verify_step_up(
        &self,
        _challenge: &StepUpChallenge,
        _code: &str,
        _method: StepUpMethod,
    ) -> AuthResult<CredentialPair> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limit_verify.load(Ordering::SeqCst) {
            return Err(AuthError::RateLimited(
                "too many verification attempts".to_string(),
            ));
        }
        if self.lock_verify.load(Ordering::SeqCst) {
            return Err(AuthError::AccountLocked(
                "account locked after repeated failures".to_string(),
            ));
        }
        if self.reject_code.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidStepUpCode("invalid code".to_string()));
        }
        Ok(fresh_pair("step-up"))
    }

    async fn current_principal(&self, _access_token: &str) -> AuthResult<Principal> {
        self.principal_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.principal_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.reject_access.load(Ordering::SeqCst) {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(self.principal.lock().unwrap().clone())
    }

    async fn permissions(&self, _access_token: &str) -> AuthResult<HashSet<String>> {
        self.permission_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_access.load(Ordering::SeqCst) {
            return Err(AuthError::NotAuthenticated);
        }
        Ok(self.granted.lock().unwrap().clone())
    }

    async fn update_principal(
        &self,
        _access_token: &str,
        update: &PrincipalUpdate,
    ) -> AuthResult<Principal> {
        let mut principal = self.principal.lock().unwrap();
        if let Some(first_name) = &update.first_name {
            principal.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            principal.last_name = last_name.clone();
        }
        if let Some(email) = &update.email {
            principal.email = email.clone();
        }
        Ok(principal.clone())
    }

    async fn logout(&self, _access_token: &str) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(AuthError::Server {
                status: 500,
                body: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn oauth_authorize_url(
        &self,
        _access_token: &str,
        provider: Provider,
        state: &str,
        redirect_uri: &str,
    ) -> AuthResult<String> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://{provider}.example.com/authorize?state={state}&redirect_uri={redirect_uri}"
        ))
    }

    async fn oauth_callback(
        &self,
        _access_token: &str,
        provider: Provider,
        _code: &str,
        _state: &str,
        _redirect_uri: &str,
    ) -> AuthResult<CredentialPair> {
        self.callback_calls.fetch_add(1, Ordering::SeqCst);
        let mut linked = self.linked.lock().unwrap();
        linked.push(LinkedIdentity {
            provider,
            provider_user_id: format!("{provider}-user-1"),
            linked_at: chrono::Utc::now(),
        });
        Ok(fresh_pair("callback"))
    }

    async fn linked_identities(&self, _access_token: &str) -> AuthResult<Vec<LinkedIdentity>> {
        self.linked_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.linked.lock().unwrap().clone())
    }

    async fn unlink_identity(&self, _access_token: &str, provider: Provider) -> AuthResult<()> {
        self.unlink_calls.fetch_add(1, Ordering::SeqCst);
        let mut linked = self.linked.lock().unwrap();
        let before = linked.len();
        linked.retain(|identity| identity.provider != provider);
        if linked.len() == before {
            return Err(AuthError::Validation(format!(
                "{provider} account is not linked"
            )));
        }
        Ok(())
    }
}
