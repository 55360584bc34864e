use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

// ==============================================================================
// INVITATIONS
// ==============================================================================

/// Row of the `invitations` table. Created by clinic administration, consumed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn invite_url(&self, frontend_url: &str) -> String {
        format!(
            "{}/invite/accept?token={}",
            frontend_url.trim_end_matches('/'),
            self.token
        )
    }
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub invite_url: String,
}

impl InviteResponse {
    pub fn from_invitation(invitation: &Invitation, frontend_url: &str) -> Self {
        Self {
            id: invitation.id,
            email: invitation.email.clone(),
            role: invitation.role,
            token: invitation.token.clone(),
            expires_at: invitation.expires_at,
            invite_url: invitation.invite_url(frontend_url),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Deactivated,

    #[error("Invitation not found")]
    InviteNotFound,

    #[error("Invitation has expired")]
    InviteExpired,

    #[error("Invitation has already been used")]
    InviteUsed,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::Deactivated => AppError::Forbidden("Account is deactivated".to_string()),
            AuthError::InviteNotFound => AppError::not_found("Invitation"),
            AuthError::InviteExpired => AppError::InviteExpired,
            AuthError::InviteUsed => AppError::InviteUsed,
            AuthError::EmailTaken => AppError::Conflict("User with this email already exists".to_string()),
            AuthError::Hash(msg) => AppError::Internal(msg),
            AuthError::Rejected(app) => app,
            AuthError::Store(store) => store.into(),
        }
    }
}
