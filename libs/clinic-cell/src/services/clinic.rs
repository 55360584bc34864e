use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{StoreError, SupabaseClient};
use shared_models::pagination::{Page, PageQuery};
use shared_utils::validation::{require_phone, require_text};
use shared_utils::AppState;

use crate::models::{Clinic, ClinicError, CreateClinicRequest, UpdateClinicRequest};

pub struct ClinicService {
    db: Arc<SupabaseClient>,
}

impl ClinicService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_clinic(&self, request: CreateClinicRequest) -> Result<Clinic, ClinicError> {
        let name = require_text(&request.name, "name", 100)?;
        let timezone = require_text(&request.timezone, "timezone", 64)?;
        let phone = optional_phone(request.phone)?;
        let now = Utc::now();

        let clinic: Clinic = self
            .db
            .insert(
                "clinics",
                json!({
                    "name": name,
                    "timezone": timezone,
                    "address": request.address,
                    "phone": phone,
                    "is_active": true,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(name_conflict)?;

        info!(clinic_id = %clinic.id, "Clinic created");
        Ok(clinic)
    }

    pub async fn get_clinic(&self, clinic_id: Uuid) -> Result<Clinic, ClinicError> {
        self.db
            .select_one("clinics", &format!("id=eq.{}", clinic_id))
            .await?
            .ok_or(ClinicError::NotFound)
    }

    pub async fn list_clinics(&self, page: &PageQuery) -> Result<Page<Clinic>, ClinicError> {
        let clinics: Vec<Clinic> = self
            .db
            .select("clinics", &format!("order=created_at.desc&{}", page.to_query()))
            .await?;
        let total = self.db.count("clinics", "").await?;

        debug!("Listed {} of {} clinics", clinics.len(), total);
        Ok(Page::new(clinics, total, page))
    }

    #[instrument(skip(self, request))]
    pub async fn update_clinic(&self, clinic_id: Uuid, request: UpdateClinicRequest) -> Result<Clinic, ClinicError> {
        let mut update = Map::new();

        if let Some(name) = request.name {
            update.insert("name".into(), json!(require_text(&name, "name", 100)?));
        }
        if let Some(timezone) = request.timezone {
            update.insert("timezone".into(), json!(require_text(&timezone, "timezone", 64)?));
        }
        if let Some(address) = request.address {
            update.insert("address".into(), json!(address));
        }
        if request.phone.is_some() {
            update.insert("phone".into(), json!(optional_phone(request.phone)?));
        }
        if let Some(active) = request.is_active {
            update.insert("is_active".into(), json!(active));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        self.db
            .update("clinics", &format!("id=eq.{}", clinic_id), Value::Object(update))
            .await
            .map_err(name_conflict)?
            .ok_or(ClinicError::NotFound)
    }

    /// Clinics are never hard-deleted; their staff and history stay intact.
    pub async fn deactivate_clinic(&self, clinic_id: Uuid) -> Result<Clinic, ClinicError> {
        let clinic = self
            .update_clinic(
                clinic_id,
                UpdateClinicRequest {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        info!(%clinic_id, "Clinic deactivated");
        Ok(clinic)
    }
}

fn optional_phone(phone: Option<String>) -> Result<Option<String>, ClinicError> {
    match phone.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(Some(require_phone(raw)?)),
        _ => Ok(None),
    }
}

fn name_conflict(err: StoreError) -> ClinicError {
    match err {
        StoreError::UniqueViolation(_) => ClinicError::NameTaken,
        other => ClinicError::Store(other),
    }
}
