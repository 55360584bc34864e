use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use staff_cell::StaffError;

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

pub const DEFAULT_SERVICE_DURATION: i32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub duration: i32,
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub duration: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ImportServicesRequest {
    pub services: Vec<CreateServiceRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceListQuery {
    #[serde(default)]
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<String>,
}

// ==============================================================================
// EXPENSES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Supplies,
    Marketing,
    Salary,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Supplies => "supplies",
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Salary => "salary",
            ExpenseCategory::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

// ==============================================================================
// REPORTS
// ==============================================================================

/// The slice of a completed visit the reports need.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportVisit {
    pub doctor_id: Uuid,
    pub total: f64,
    pub discount_amount: f64,
    pub doctor_earning: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorEarning {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub revenue: f64,
    pub earning: f64,
    pub visit_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitTotals {
    pub visits_count: usize,
    pub total_revenue: f64,
    pub total_discount: f64,
    pub total_doctor_earnings: f64,
    pub doctor_earnings: Vec<DoctorEarning>,
}

#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub patients_count: u64,
    pub visits_count: usize,
    pub total_revenue: f64,
    pub total_discount: f64,
    pub doctor_earnings: Vec<DoctorEarning>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub patients_count: u64,
    pub visits_count: usize,
    pub total_revenue: f64,
    pub total_discount: f64,
    pub doctor_earnings: Vec<DoctorEarning>,
    pub total_expenses: f64,
    pub expenses_by_category: BTreeMap<ExpenseCategory, f64>,
    pub total_salaries: f64,
    pub total_doctor_earnings: f64,
    pub gross_profit: f64,
    pub net_profit: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyReportQuery {
    pub date: Option<String>,
}

// ==============================================================================
// AUDIT LOG
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub actor_user_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum FinanceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Service with this name already exists")]
    ServiceNameTaken,

    #[error("Price must not be negative")]
    InvalidPrice,

    #[error("Duration must be between 5 and 480 minutes")]
    InvalidDuration,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Month must be between 1 and 12")]
    InvalidMonth,

    #[error(transparent)]
    Staff(#[from] StaffError),

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FinanceError> for AppError {
    fn from(err: FinanceError) -> Self {
        match err {
            FinanceError::NotFound(what) => AppError::not_found(what),
            FinanceError::ServiceNameTaken => AppError::Conflict(err.to_string()),
            FinanceError::InvalidPrice
            | FinanceError::InvalidDuration
            | FinanceError::InvalidAmount
            | FinanceError::InvalidMonth => AppError::ValidationError(err.to_string()),
            FinanceError::Staff(staff) => staff.into(),
            FinanceError::Rejected(app) => app,
            FinanceError::Store(store) => store.into(),
        }
    }
}
