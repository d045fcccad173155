//! Core data model: principals, roles, challenges, linked identities.

use crate::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use credential_vault::CredentialPair;

/// The authenticated user record held by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

/// A role granted to a principal. Owned by the authorization backend;
/// cached read-only as part of the principal snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Permission strings in `resource:action` form.
    #[serde(default)]
    pub permissions: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Opaque handle returned instead of a credential pair when a second factor
/// is required. Scoped to a single login attempt, consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUpChallenge {
    pub token: String,
}

/// Which second factor a submission used. Stays on this side of the
/// wire; the backend request encodes it as an `is_backup` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpMethod {
    /// 6-digit time-based one-time code
    Totp,
    /// Single-use backup code
    Backup,
}

/// A second-factor code supplied by the caller, tagged with its method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepUpCode {
    Totp(String),
    Backup(String),
}

impl StepUpCode {
    pub fn method(&self) -> StepUpMethod {
        match self {
            StepUpCode::Totp(_) => StepUpMethod::Totp,
            StepUpCode::Backup(_) => StepUpMethod::Backup,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            StepUpCode::Totp(code) | StepUpCode::Backup(code) => code,
        }
    }

    /// Shape check performed before any network call.
    ///
    /// TOTP codes are exactly six ASCII digits. Backup codes are
    /// dash-delimited groups of uppercase alphanumerics (`XXXX-XXXX`).
    pub fn validate(&self) -> AuthResult<()> {
        match self {
            StepUpCode::Totp(code) => {
                if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(AuthError::Validation(
                        "TOTP code must be exactly 6 digits".to_string(),
                    ))
                }
            }
            StepUpCode::Backup(code) => {
                let groups: Vec<&str> = code.split('-').collect();
                let well_formed = groups.len() >= 2
                    && groups.iter().all(|g| {
                        !g.is_empty()
                            && g.bytes()
                                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
                    });
                if well_formed {
                    Ok(())
                } else {
                    Err(AuthError::Validation(
                        "backup code must be dash-delimited groups like XXXX-XXXX".to_string(),
                    ))
                }
            }
        }
    }
}

/// The two shapes a login attempt can come back as.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Password accepted, no second factor configured.
    Session(CredentialPair),
    /// Password accepted, second factor required.
    StepUpRequired(StepUpChallenge),
}

/// A supported third-party identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
    Discord,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
            Provider::Discord => "discord",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A third-party provider account associated with the principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub provider: Provider,
    pub provider_user_id: String,
    pub linked_at: DateTime<Utc>,
}

/// New-account registration data.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub agree_to_terms: bool,
}

impl RegisterRequest {
    /// Client-side shape checks; the backend enforces the full policy.
    pub fn validate(&self) -> AuthResult<()> {
        if !self.email.contains('@') {
            return Err(AuthError::Validation("invalid email address".to_string()));
        }
        if self.password.len() < 8 {
            return Err(AuthError::Validation(
                "password must be at least 8 characters long".to_string(),
            ));
        }
        if self.password != self.confirm_password {
            return Err(AuthError::Validation("passwords do not match".to_string()));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AuthError::Validation("name fields are required".to_string()));
        }
        if !self.agree_to_terms {
            return Err(AuthError::Validation(
                "you must agree to the terms and conditions".to_string(),
            ));
        }
        Ok(())
    }
}

/// Profile fields a principal may change about themselves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrincipalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
