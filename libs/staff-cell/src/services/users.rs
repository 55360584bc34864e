use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use auth_cell::services::PasswordService;
use shared_database::{StoreError, SupabaseClient};
use shared_models::auth::{Role, User, UserProfile, UserRecord};
use shared_models::error::AppError;
use shared_models::pagination::{Page, PageQuery};
use shared_utils::validation::{require_email, require_password, require_phone, require_text};
use shared_utils::AppState;

use crate::models::{CreateUserRequest, StaffError};

pub struct UserService {
    db: Arc<SupabaseClient>,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, creator, request), fields(role = %request.role))]
    pub async fn create_user(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateUserRequest,
    ) -> Result<UserProfile, StaffError> {
        if !creator.role.can_create(request.role) {
            return Err(StaffError::RoleNotAllowed);
        }

        let email = require_email(&request.email)?;
        require_password(&request.password)?;
        let first_name = require_text(&request.first_name, "first_name", 100)?;
        let last_name = require_text(&request.last_name, "last_name", 100)?;
        let phone = match request.phone.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(require_phone(raw)?),
            _ => None,
        };

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| StaffError::Rejected(e.into()))?;

        let record = self
            .insert_user(json!({
                "email": email,
                "phone": phone,
                "password_hash": password_hash,
                "first_name": first_name,
                "last_name": last_name,
                "role": request.role,
                "clinic_id": clinic_id,
                "is_active": true,
            }))
            .await?;

        info!(user_id = %record.id, %clinic_id, "Staff member created");
        Ok(record.to_profile())
    }

    pub async fn list_users(&self, clinic_id: Uuid, page: &PageQuery) -> Result<Page<UserProfile>, StaffError> {
        let filter = format!("clinic_id=eq.{}", clinic_id);
        let records: Vec<UserRecord> = self
            .db
            .select("users", &format!("{}&order=created_at.desc&{}", filter, page.to_query()))
            .await?;
        let total = self.db.count("users", &filter).await?;

        let profiles = records.iter().map(UserRecord::to_profile).collect();
        Ok(Page::new(profiles, total, page))
    }

    /// Active doctors of the clinic, alphabetical.
    pub async fn list_doctors(&self, clinic_id: Uuid) -> Result<Vec<UserProfile>, StaffError> {
        let records: Vec<UserRecord> = self
            .db
            .select(
                "users",
                &format!(
                    "clinic_id=eq.{}&role=eq.doctor&is_active=is.true&order=last_name.asc,first_name.asc",
                    clinic_id
                ),
            )
            .await?;
        Ok(records.iter().map(UserRecord::to_profile).collect())
    }

    /// Tenant-scoped lookup; a user of another clinic is reported as missing.
    pub async fn find_in_clinic(&self, clinic_id: Uuid, user_id: Uuid) -> Result<Option<UserRecord>, StaffError> {
        Ok(self
            .db
            .select_one("users", &format!("id=eq.{}&clinic_id=eq.{}", user_id, clinic_id))
            .await?)
    }

    pub async fn get_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<UserRecord, StaffError> {
        let user = self
            .find_in_clinic(clinic_id, doctor_id)
            .await?
            .ok_or(StaffError::NotFound("Doctor"))?;
        if user.role != Role::Doctor {
            return Err(StaffError::NotADoctor);
        }
        Ok(user)
    }

    pub async fn deactivate_user(&self, clinic_id: Uuid, actor: &User, user_id: Uuid) -> Result<(), StaffError> {
        if actor.id == user_id {
            return Err(StaffError::Rejected(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            )));
        }

        let updated: Option<UserRecord> = self
            .db
            .update(
                "users",
                &format!("id=eq.{}&clinic_id=eq.{}", user_id, clinic_id),
                json!({ "is_active": false, "updated_at": Utc::now() }),
            )
            .await?;

        updated.ok_or(StaffError::NotFound("User"))?;
        info!(%user_id, %clinic_id, "Staff member deactivated");
        Ok(())
    }

    /// Creates the platform superadmin unless one already exists. Safe to call on every start.
    #[instrument(skip(self, password))]
    pub async fn seed_superadmin(&self, email: &str, password: &str) -> Result<bool, StaffError> {
        let existing: Option<UserRecord> = self.db.select_one("users", "role=eq.superadmin").await?;
        if existing.is_some() {
            return Ok(false);
        }

        let password_hash = PasswordService::hash_password(password)
            .map_err(|e| StaffError::Rejected(e.into()))?;

        let record = self
            .insert_user(json!({
                "email": email.trim().to_lowercase(),
                "password_hash": password_hash,
                "first_name": "Super",
                "last_name": "Admin",
                "role": Role::Superadmin,
                "clinic_id": null,
                "is_active": true,
            }))
            .await?;

        info!(user_id = %record.id, "Superadmin account created");
        Ok(true)
    }

    async fn insert_user(&self, mut body: serde_json::Value) -> Result<UserRecord, StaffError> {
        let now = Utc::now();
        body["created_at"] = json!(now);
        body["updated_at"] = json!(now);

        self.db.insert("users", body).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => StaffError::EmailTaken,
            other => StaffError::Store(other),
        })
    }
}
