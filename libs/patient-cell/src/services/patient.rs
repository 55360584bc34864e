use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{StoreError, SupabaseClient};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::Page;
use shared_utils::validation::{require_phone, require_text};
use shared_utils::AppState;

use crate::models::{
    CreatePatientRequest, ImportReport, Patient, PatientError, PatientListQuery, UpdatePatientRequest,
};

const NAME_MAX: usize = 50;

pub struct PatientService {
    db: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, creator, request))]
    pub async fn create_patient(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let first_name = require_text(&request.first_name, "first_name", NAME_MAX)?;
        let last_name = require_text(&request.last_name, "last_name", NAME_MAX)?;
        let phone = require_phone(&request.phone)?;

        if self.phone_in_use(clinic_id, &phone, None).await? {
            return Err(PatientError::PhoneTaken);
        }

        let now = Utc::now();
        let patient: Patient = self
            .db
            .insert(
                "patients",
                json!({
                    "clinic_id": clinic_id,
                    "first_name": first_name,
                    "last_name": last_name,
                    "phone": phone,
                    "dob": request.dob,
                    "gender": request.gender,
                    "address": request.address,
                    "notes": request.notes,
                    "is_active": true,
                    "created_by": creator.id,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(phone_conflict)?;

        info!(patient_id = %patient.id, %clinic_id, "Patient created");
        Ok(patient)
    }

    pub async fn get_patient(&self, clinic_id: Uuid, patient_id: Uuid) -> Result<Patient, PatientError> {
        self.db
            .select_one(
                "patients",
                &format!("id=eq.{}&clinic_id=eq.{}&is_active=is.true", patient_id, clinic_id),
            )
            .await?
            .ok_or(PatientError::NotFound)
    }

    /// Existence check used by booking and visits.
    pub async fn ensure_in_clinic(&self, clinic_id: Uuid, patient_id: Uuid) -> Result<(), PatientError> {
        self.get_patient(clinic_id, patient_id).await.map(|_| ())
    }

    pub async fn list_patients(
        &self,
        clinic_id: Uuid,
        query: &PatientListQuery,
    ) -> Result<Page<Patient>, PatientError> {
        let page = query.page();
        let mut filter = format!("clinic_id=eq.{}&is_active=is.true", clinic_id);
        if let Some(term) = query.term() {
            filter.push_str(&search_filter(term));
        }

        let patients: Vec<Patient> = self
            .db
            .select(
                "patients",
                &format!("{}&order=last_name.asc,first_name.asc&{}", filter, page.to_query()),
            )
            .await?;
        let total = self.db.count("patients", &filter).await?;

        debug!(%clinic_id, returned = patients.len(), total, "Listed patients");
        Ok(Page::new(patients, total, &page))
    }

    #[instrument(skip(self, request))]
    pub async fn update_patient(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        self.get_patient(clinic_id, patient_id).await?;

        let mut update = Map::new();
        if let Some(first_name) = request.first_name {
            update.insert("first_name".into(), json!(require_text(&first_name, "first_name", NAME_MAX)?));
        }
        if let Some(last_name) = request.last_name {
            update.insert("last_name".into(), json!(require_text(&last_name, "last_name", NAME_MAX)?));
        }
        if let Some(phone) = request.phone {
            let phone = require_phone(&phone)?;
            if self.phone_in_use(clinic_id, &phone, Some(patient_id)).await? {
                return Err(PatientError::PhoneTaken);
            }
            update.insert("phone".into(), json!(phone));
        }
        if let Some(dob) = request.dob {
            update.insert("dob".into(), json!(dob));
        }
        if let Some(gender) = request.gender {
            update.insert("gender".into(), json!(gender));
        }
        if let Some(address) = request.address {
            update.insert("address".into(), json!(address));
        }
        if let Some(notes) = request.notes {
            update.insert("notes".into(), json!(notes));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        let patient = self
            .db
            .update(
                "patients",
                &format!("id=eq.{}&clinic_id=eq.{}", patient_id, clinic_id),
                Value::Object(update),
            )
            .await
            .map_err(phone_conflict)?
            .ok_or(PatientError::NotFound)?;

        info!(%patient_id, "Patient updated");
        Ok(patient)
    }

    /// Soft delete; visits and appointments keep pointing at the row.
    pub async fn deactivate_patient(&self, clinic_id: Uuid, patient_id: Uuid) -> Result<(), PatientError> {
        let updated: Option<Patient> = self
            .db
            .update(
                "patients",
                &format!("id=eq.{}&clinic_id=eq.{}&is_active=is.true", patient_id, clinic_id),
                json!({ "is_active": false, "updated_at": Utc::now() }),
            )
            .await?;

        updated.ok_or(PatientError::NotFound)?;
        info!(%patient_id, %clinic_id, "Patient deactivated");
        Ok(())
    }

    /// Creates each row independently; failures are reported per row and never abort the batch.
    pub async fn import_patients(
        &self,
        clinic_id: Uuid,
        creator: &User,
        rows: Vec<CreatePatientRequest>,
    ) -> Result<ImportReport, PatientError> {
        if rows.is_empty() {
            return Err(AppError::ValidationError("No patients provided".to_string()).into());
        }

        let mut report = ImportReport { imported: 0, errors: Vec::new() };
        for (index, row) in rows.into_iter().enumerate() {
            match self.create_patient(clinic_id, creator, row).await {
                Ok(_) => report.imported += 1,
                Err(err) => {
                    let message = AppError::from(err).public_message();
                    report.errors.push(format!("Row {}: {}", index + 1, message));
                }
            }
        }

        if !report.errors.is_empty() {
            warn!(%clinic_id, failed = report.errors.len(), "Patient import finished with errors");
        }
        info!(%clinic_id, imported = report.imported, "Patient import finished");
        Ok(report)
    }

    async fn phone_in_use(&self, clinic_id: Uuid, phone: &str, except: Option<Uuid>) -> Result<bool, PatientError> {
        let mut query = format!("clinic_id=eq.{}&phone=eq.{}", clinic_id, urlencoding::encode(phone));
        if let Some(id) = except {
            query.push_str(&format!("&id=neq.{}", id));
        }
        let existing: Option<Patient> = self.db.select_one("patients", &query).await?;
        Ok(existing.is_some())
    }
}

fn phone_conflict(err: StoreError) -> PatientError {
    match err {
        StoreError::UniqueViolation(_) => PatientError::PhoneTaken,
        other => PatientError::Store(other),
    }
}

/// Case-insensitive match on either name or the phone number, as a PostgREST `or` filter.
/// Characters that carry meaning inside the filter syntax are dropped from the term.
pub fn search_filter(term: &str) -> String {
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '.' | ':' | '"' | '\\'))
        .collect();
    let pattern = format!("*{}*", cleaned.trim());
    let clause = format!(
        "(first_name.ilike.{p},last_name.ilike.{p},phone.ilike.{p})",
        p = pattern
    );
    format!("&or={}", urlencoding::encode(&clause))
}
