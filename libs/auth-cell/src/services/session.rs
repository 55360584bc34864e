use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{format_timestamp, StoreError, SupabaseClient};
use shared_models::auth::{AuthResponse, UserRecord};
use shared_models::error::AppError;
use shared_utils::jwt::JwtService;
use shared_utils::validation::{require_email, require_password, require_phone, require_text};
use shared_utils::AppState;

use crate::models::{AcceptInviteRequest, AuthError, Invitation, LoginRequest, RefreshRequest};
use crate::services::password::PasswordService;

pub struct AuthService {
    db: Arc<SupabaseClient>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            jwt: state.jwt.clone(),
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_lowercase();

        let user = self
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !PasswordService::verify_password(&request.password, &user.password_hash) {
            debug!("Password mismatch for {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        info!(user_id = %user.id, role = %user.role, "User logged in");
        self.issue(&user)
    }

    #[instrument(skip(self, request))]
    pub async fn refresh(&self, request: RefreshRequest) -> Result<AuthResponse, AuthError> {
        let principal = self.jwt.validate_refresh(&request.refresh_token)?;

        // The account may have been deactivated since the refresh token was issued.
        let user: UserRecord = self
            .db
            .select_one("users", &format!("id=eq.{}", principal.id))
            .await?
            .ok_or(AuthError::Rejected(AppError::TokenInvalid))?;

        if !user.is_active {
            return Err(AuthError::Deactivated);
        }

        self.issue(&user)
    }

    /// Creates the invited account, burns the invitation and signs the user in.
    #[instrument(skip(self, request))]
    pub async fn accept_invite(&self, request: AcceptInviteRequest) -> Result<AuthResponse, AuthError> {
        require_password(&request.password)?;
        let first_name = require_text(&request.first_name, "first_name", 100)?;
        let last_name = require_text(&request.last_name, "last_name", 100)?;
        let phone = match request.phone.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(require_phone(raw)?),
            _ => None,
        };

        let invitation: Invitation = self
            .db
            .select_one(
                "invitations",
                &format!("token=eq.{}", urlencoding::encode(request.token.trim())),
            )
            .await?
            .ok_or(AuthError::InviteNotFound)?;

        if invitation.is_expired(Utc::now()) {
            return Err(AuthError::InviteExpired);
        }
        if invitation.is_used() {
            return Err(AuthError::InviteUsed);
        }

        let email = require_email(&invitation.email)?;
        if self.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = PasswordService::hash_password(&request.password)?;
        let now = Utc::now();

        let user: UserRecord = self
            .db
            .insert(
                "users",
                json!({
                    "email": email,
                    "phone": phone,
                    "password_hash": password_hash,
                    "first_name": first_name,
                    "last_name": last_name,
                    "role": invitation.role,
                    "clinic_id": invitation.clinic_id,
                    "is_active": true,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        self.mark_invitation_used(invitation.id).await;

        info!(user_id = %user.id, clinic_id = %invitation.clinic_id, role = %user.role, "Invitation accepted");
        self.issue(&user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.db
            .select_one("users", &format!("email=eq.{}", urlencoding::encode(email)))
            .await
    }

    async fn mark_invitation_used(&self, invitation_id: Uuid) {
        let now = format_timestamp(&Utc::now());
        let result: Result<Option<Invitation>, StoreError> = self
            .db
            .update(
                "invitations",
                &format!("id=eq.{}&used_at=is.null", invitation_id),
                json!({ "used_at": now }),
            )
            .await;

        if let Err(e) = result {
            warn!(%invitation_id, "Failed to mark invitation as used: {}", e);
        }
    }

    fn issue(&self, user: &UserRecord) -> Result<AuthResponse, AuthError> {
        let pair = self.jwt.issue_pair(user)?;
        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: user.to_profile(),
        })
    }
}
