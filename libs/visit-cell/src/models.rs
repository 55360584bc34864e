use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::AppointmentError;
use finance_cell::FinanceError;
use patient_cell::PatientError;
use shared_database::StoreError;
use shared_models::error::AppError;
use staff_cell::StaffError;

// ==============================================================================
// VISIT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Started,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    None,
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Cash => f.write_str("cash"),
            PaymentType::Card => f.write_str("card"),
        }
    }
}

/// A catalog service as billed on a visit. Name and price are copied at billing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitServiceLine {
    pub service_id: Uuid,
    pub service_name: String,
    pub price: f64,
    pub quantity: i32,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitPlanStep {
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub clinic_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub status: VisitStatus,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub affected_teeth: Vec<String>,
    #[serde(default)]
    pub plan_steps: Vec<VisitPlanStep>,
    #[serde(default)]
    pub xray_images: Vec<String>,
    #[serde(default)]
    pub services: Vec<VisitServiceLine>,
    pub subtotal: f64,
    #[serde(default)]
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub discount_amount: f64,
    pub total: f64,
    pub doctor_share: f64,
    pub doctor_earning: f64,
    #[serde(default)]
    pub payment_type: Option<PaymentType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Visit {
    pub fn is_completed(&self) -> bool {
        self.status == VisitStatus::Completed
    }

    /// Diagnosis saved on the draft, ignoring blank text.
    pub fn saved_diagnosis(&self) -> Option<&str> {
        self.diagnosis.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitView {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient_name: String,
}

// ==============================================================================
// VISIT REQUESTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct StartVisitRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitServiceInput {
    pub service_id: Uuid,
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveDraftRequest {
    pub diagnosis: Option<String>,
    pub services: Option<Vec<VisitServiceInput>>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<f64>,
    pub payment_type: Option<PaymentType>,
    pub affected_teeth: Option<Vec<String>>,
    pub plan_steps: Option<Vec<VisitPlanStep>>,
    pub comment: Option<String>,
    pub xray_images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteVisitRequest {
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub services: Vec<VisitServiceInput>,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: f64,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub affected_teeth: Option<Vec<String>>,
    #[serde(default)]
    pub xray_images: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisitListQuery {
    pub date: Option<String>,
}

// ==============================================================================
// TREATMENT PLANS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
}

impl PlanStatus {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim() {
            "pending" => Ok(PlanStatus::Pending),
            "in_progress" => Ok(PlanStatus::InProgress),
            "completed" => Ok(PlanStatus::Completed),
            other => Err(AppError::ValidationError(format!("Invalid plan status: {}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_number: u32,
    pub description: String,
    pub status: StepStatus,
    #[serde(default)]
    pub visit_id: Option<Uuid>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan with its `done/total` progress, e.g. `"2/3"`.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentPlanView {
    #[serde(flatten)]
    pub plan: TreatmentPlan,
    pub progress: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanStep {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTreatmentPlanRequest {
    pub patient_id: Uuid,
    pub title: String,
    pub steps: Vec<CreatePlanStep>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanStepRequest {
    pub status: StepStatus,
    #[serde(default)]
    pub visit_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanListQuery {
    pub patient_id: Option<String>,
    pub status: Option<String>,
}

// ==============================================================================
// UPLOADS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub url: String,
    pub filename: String,
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub url: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum VisitError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Visit is already completed")]
    AlreadyCompleted,

    #[error("Cannot edit completed visit")]
    Locked,

    #[error("This appointment is for another doctor")]
    ForeignAppointment,

    #[error("A visit already exists for this appointment")]
    AppointmentTaken,

    #[error("One or more services not found")]
    ServicesNotFound,

    #[error("Diagnosis is required to complete the visit")]
    DiagnosisRequired,

    #[error("{0}")]
    InvalidDiscount(&'static str),

    #[error("Invalid step number")]
    InvalidStep,

    #[error("{0}")]
    InvalidImage(String),

    #[error("Image storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Staff(#[from] StaffError),

    #[error(transparent)]
    Finance(#[from] FinanceError),

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<VisitError> for AppError {
    fn from(err: VisitError) -> Self {
        match err {
            VisitError::NotFound(what) => AppError::not_found(what),
            VisitError::AlreadyCompleted
            | VisitError::Locked
            | VisitError::ServicesNotFound
            | VisitError::InvalidStep
            | VisitError::InvalidImage(_) => AppError::BadRequest(err.to_string()),
            VisitError::ForeignAppointment => AppError::Forbidden(err.to_string()),
            VisitError::AppointmentTaken => AppError::Conflict(err.to_string()),
            VisitError::DiagnosisRequired => AppError::DiagnosisRequired,
            VisitError::InvalidDiscount(msg) => AppError::InvalidDiscount(msg.to_string()),
            VisitError::Storage(io) => AppError::Internal(format!("Image storage failed: {}", io)),
            VisitError::Appointment(appointment) => appointment.into(),
            VisitError::Patient(patient) => patient.into(),
            VisitError::Staff(staff) => staff.into(),
            VisitError::Finance(finance) => finance.into(),
            VisitError::Rejected(app) => app,
            VisitError::Store(store) => store.into(),
        }
    }
}
