use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use auth_cell::models::Invitation;
use shared_database::{format_timestamp, SupabaseClient};
use shared_models::auth::Role;
use shared_utils::validation::require_email;
use shared_utils::AppState;

use crate::models::{Clinic, ClinicError, EmailError};
use crate::services::email::{EmailSender, ResendEmailSender};

const INVITE_TTL_DAYS: i64 = 7;
const TOKEN_BYTES: usize = 32;

pub struct InvitationService {
    db: Arc<SupabaseClient>,
    sender: Arc<dyn EmailSender>,
    frontend_url: String,
    email_enabled: bool,
}

impl InvitationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            sender: Arc::new(ResendEmailSender::new(&state.config)),
            frontend_url: state.config.frontend_url.clone(),
            email_enabled: state.config.is_email_configured(),
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.sender = sender;
        self.email_enabled = true;
        self
    }

    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    /// Returns the pending invitation for this address if one is still usable,
    /// otherwise issues a new one. The e-mail is best effort.
    #[instrument(skip(self, email))]
    pub async fn invite_boss(&self, clinic: &Clinic, created_by: Uuid, email: &str) -> Result<Invitation, ClinicError> {
        let email = require_email(email)?;

        let invitation = match self.find_pending(clinic.id, &email).await? {
            Some(existing) => {
                debug!(invitation_id = %existing.id, "Reusing pending invitation");
                existing
            }
            None => self.create_invitation(clinic.id, created_by, &email, Role::Boss).await?,
        };

        if self.email_enabled {
            let url = invitation.invite_url(&self.frontend_url);
            match self.sender.send_invite(&email, &clinic.name, &url).await {
                Ok(()) => info!(invitation_id = %invitation.id, "Invitation e-mail sent"),
                Err(EmailError::NotConfigured) => debug!("E-mail delivery not configured"),
                Err(e) => warn!(invitation_id = %invitation.id, "Failed to send invitation e-mail: {}", e),
            }
        }

        Ok(invitation)
    }

    async fn find_pending(&self, clinic_id: Uuid, email: &str) -> Result<Option<Invitation>, ClinicError> {
        let query = format!(
            "clinic_id=eq.{}&email=eq.{}&used_at=is.null&expires_at=gt.{}&order=created_at.desc",
            clinic_id,
            urlencoding::encode(email),
            format_timestamp(&Utc::now())
        );
        Ok(self.db.select_one("invitations", &query).await?)
    }

    async fn create_invitation(
        &self,
        clinic_id: Uuid,
        created_by: Uuid,
        email: &str,
        role: Role,
    ) -> Result<Invitation, ClinicError> {
        let now = Utc::now();
        let invitation: Invitation = self
            .db
            .insert(
                "invitations",
                json!({
                    "clinic_id": clinic_id,
                    "email": email,
                    "role": role,
                    "token": generate_token(),
                    "expires_at": now + Duration::days(INVITE_TTL_DAYS),
                    "created_by": created_by,
                    "created_at": now,
                }),
            )
            .await?;

        info!(invitation_id = %invitation.id, %clinic_id, "Invitation created");
        Ok(invitation)
    }
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
