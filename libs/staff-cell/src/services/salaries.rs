use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_utils::AppState;

use crate::models::{CreateSalaryRequest, StaffError, StaffSalary, UpdateSalaryRequest};
use crate::services::users::UserService;

pub struct SalaryService {
    db: Arc<SupabaseClient>,
}

impl SalaryService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    pub async fn create_salary(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateSalaryRequest,
    ) -> Result<StaffSalary, StaffError> {
        validate_amount(request.monthly_amount)?;

        let staff = UserService::from_client(self.db.clone())
            .find_in_clinic(clinic_id, request.user_id)
            .await?
            .ok_or(StaffError::NotFound("User"))?;
        if staff.role == Role::Doctor {
            return Err(StaffError::DoctorSalary);
        }

        let now = Utc::now();
        let salary: StaffSalary = self
            .db
            .insert(
                "staff_salaries",
                json!({
                    "clinic_id": clinic_id,
                    "user_id": request.user_id,
                    "monthly_amount": request.monthly_amount,
                    "effective_from": request.effective_from,
                    "is_active": true,
                    "created_by": creator.id,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!(salary_id = %salary.id, user_id = %salary.user_id, "Staff salary created");
        Ok(salary)
    }

    pub async fn list_salaries(&self, clinic_id: Uuid) -> Result<Vec<StaffSalary>, StaffError> {
        Ok(self
            .db
            .select(
                "staff_salaries",
                &format!("clinic_id=eq.{}&order=created_at.desc", clinic_id),
            )
            .await?)
    }

    /// Salaries the monthly report charges against the clinic.
    pub async fn active_salaries(&self, clinic_id: Uuid) -> Result<Vec<StaffSalary>, StaffError> {
        Ok(self
            .db
            .select(
                "staff_salaries",
                &format!("clinic_id=eq.{}&is_active=is.true", clinic_id),
            )
            .await?)
    }

    pub async fn get_salary(&self, clinic_id: Uuid, salary_id: Uuid) -> Result<StaffSalary, StaffError> {
        self.db
            .select_one(
                "staff_salaries",
                &format!("id=eq.{}&clinic_id=eq.{}", salary_id, clinic_id),
            )
            .await?
            .ok_or(StaffError::NotFound("Salary"))
    }

    pub async fn update_salary(
        &self,
        clinic_id: Uuid,
        salary_id: Uuid,
        request: UpdateSalaryRequest,
    ) -> Result<StaffSalary, StaffError> {
        let mut update = Map::new();

        if let Some(amount) = request.monthly_amount {
            validate_amount(amount)?;
            update.insert("monthly_amount".into(), json!(amount));
        }
        if let Some(effective_from) = request.effective_from {
            update.insert("effective_from".into(), json!(effective_from));
        }
        if let Some(active) = request.is_active {
            update.insert("is_active".into(), json!(active));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        self.db
            .update(
                "staff_salaries",
                &format!("id=eq.{}&clinic_id=eq.{}", salary_id, clinic_id),
                Value::Object(update),
            )
            .await?
            .ok_or(StaffError::NotFound("Salary"))
    }

    pub async fn delete_salary(&self, clinic_id: Uuid, salary_id: Uuid) -> Result<(), StaffError> {
        let removed = self
            .db
            .delete(
                "staff_salaries",
                &format!("id=eq.{}&clinic_id=eq.{}", salary_id, clinic_id),
            )
            .await?;

        if removed == 0 {
            return Err(StaffError::NotFound("Salary"));
        }
        Ok(())
    }
}

fn validate_amount(amount: f64) -> Result<(), StaffError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(StaffError::InvalidAmount);
    }
    Ok(())
}
