use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// USERS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
}

// ==============================================================================
// DOCTOR CONTRACTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorContract {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub share_percentage: f64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorContract {
    /// Active, started on or before `date`, and not yet ended.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active && self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateContractRequest {
    pub doctor_id: Uuid,
    pub share_percentage: f64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateContractRequest {
    pub share_percentage: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

// ==============================================================================
// STAFF SALARIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSalary {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub monthly_amount: f64,
    pub effective_from: NaiveDate,
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalaryRequest {
    pub user_id: Uuid,
    pub monthly_amount: f64,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSalaryRequest {
    pub monthly_amount: Option<f64>,
    pub effective_from: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum StaffError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("You cannot create users with this role")]
    RoleNotAllowed,

    #[error("User is not a doctor")]
    NotADoctor,

    #[error("Doctors are paid through contracts, not salaries")]
    DoctorSalary,

    #[error("Share percentage must be between 0 and 100")]
    InvalidShare,

    #[error("Monthly amount must be positive")]
    InvalidAmount,

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StaffError> for AppError {
    fn from(err: StaffError) -> Self {
        match err {
            StaffError::NotFound(what) => AppError::not_found(what),
            StaffError::EmailTaken => AppError::Conflict(err.to_string()),
            StaffError::RoleNotAllowed => AppError::Forbidden(err.to_string()),
            StaffError::NotADoctor | StaffError::DoctorSalary => AppError::BadRequest(err.to_string()),
            StaffError::InvalidShare | StaffError::InvalidAmount => AppError::ValidationError(err.to_string()),
            StaffError::Rejected(app) => app,
            StaffError::Store(store) => store.into(),
        }
    }
}
