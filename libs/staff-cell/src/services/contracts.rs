use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{CreateContractRequest, DoctorContract, StaffError, UpdateContractRequest};
use crate::services::users::UserService;

pub struct ContractService {
    db: Arc<SupabaseClient>,
}

impl ContractService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, creator, request), fields(doctor_id = %request.doctor_id))]
    pub async fn create_contract(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateContractRequest,
    ) -> Result<DoctorContract, StaffError> {
        validate_share(request.share_percentage)?;
        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(StaffError::Rejected(AppError::ValidationError(
                    "end_date must not be before start_date".to_string(),
                )));
            }
        }

        UserService::from_client(self.db.clone())
            .get_doctor(clinic_id, request.doctor_id)
            .await?;

        let now = Utc::now();
        let contract: DoctorContract = self
            .db
            .insert(
                "doctor_contracts",
                json!({
                    "clinic_id": clinic_id,
                    "doctor_id": request.doctor_id,
                    "share_percentage": request.share_percentage,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                    "is_active": true,
                    "notes": request.notes,
                    "created_by": creator.id,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!(
            contract_id = %contract.id,
            share = contract.share_percentage,
            "Doctor contract created"
        );
        Ok(contract)
    }

    pub async fn list_contracts(&self, clinic_id: Uuid) -> Result<Vec<DoctorContract>, StaffError> {
        Ok(self
            .db
            .select(
                "doctor_contracts",
                &format!("clinic_id=eq.{}&order=start_date.desc", clinic_id),
            )
            .await?)
    }

    pub async fn get_contract(&self, clinic_id: Uuid, contract_id: Uuid) -> Result<DoctorContract, StaffError> {
        self.db
            .select_one(
                "doctor_contracts",
                &format!("id=eq.{}&clinic_id=eq.{}", contract_id, clinic_id),
            )
            .await?
            .ok_or(StaffError::NotFound("Contract"))
    }

    pub async fn update_contract(
        &self,
        clinic_id: Uuid,
        contract_id: Uuid,
        request: UpdateContractRequest,
    ) -> Result<DoctorContract, StaffError> {
        let mut update = Map::new();

        if let Some(share) = request.share_percentage {
            validate_share(share)?;
            update.insert("share_percentage".into(), json!(share));
        }
        if let Some(end_date) = request.end_date {
            update.insert("end_date".into(), json!(end_date));
        }
        if let Some(active) = request.is_active {
            update.insert("is_active".into(), json!(active));
        }
        if let Some(notes) = request.notes {
            update.insert("notes".into(), json!(notes));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        let contract = self
            .db
            .update(
                "doctor_contracts",
                &format!("id=eq.{}&clinic_id=eq.{}", contract_id, clinic_id),
                Value::Object(update),
            )
            .await?
            .ok_or(StaffError::NotFound("Contract"))?;

        info!(%contract_id, "Doctor contract updated");
        Ok(contract)
    }

    pub async fn delete_contract(&self, clinic_id: Uuid, contract_id: Uuid) -> Result<(), StaffError> {
        let removed = self
            .db
            .delete(
                "doctor_contracts",
                &format!("id=eq.{}&clinic_id=eq.{}", contract_id, clinic_id),
            )
            .await?;

        if removed == 0 {
            return Err(StaffError::NotFound("Contract"));
        }
        info!(%contract_id, "Doctor contract deleted");
        Ok(())
    }

    /// The contract governing a doctor's earnings on `date`: the most recently started
    /// active contract whose period contains the date.
    pub async fn find_active(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorContract>, StaffError> {
        let candidates: Vec<DoctorContract> = self
            .db
            .select(
                "doctor_contracts",
                &format!(
                    "clinic_id=eq.{}&doctor_id=eq.{}&is_active=is.true&start_date=lte.{}&order=start_date.desc",
                    clinic_id, doctor_id, date
                ),
            )
            .await?;

        let active = select_active(candidates, date);
        debug!(%doctor_id, %date, found = active.is_some(), "Resolved active contract");
        Ok(active)
    }

    /// Share percentage in force on `date`; 0 when the doctor has no contract.
    pub async fn share_for(&self, clinic_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> Result<f64, StaffError> {
        Ok(self
            .find_active(clinic_id, doctor_id, date)
            .await?
            .map(|contract| contract.share_percentage)
            .unwrap_or(0.0))
    }
}

pub fn select_active(mut contracts: Vec<DoctorContract>, date: NaiveDate) -> Option<DoctorContract> {
    contracts.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    contracts.into_iter().find(|contract| contract.covers(date))
}

fn validate_share(share: f64) -> Result<(), StaffError> {
    if !share.is_finite() || !(0.0..=100.0).contains(&share) {
        return Err(StaffError::InvalidShare);
    }
    Ok(())
}
