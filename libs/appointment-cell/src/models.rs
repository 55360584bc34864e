use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use patient_cell::PatientError;
use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use staff_cell::StaffError;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(AppError::ValidationError(format!("Invalid appointment status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment as listed to staff, with display names resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

/// Raw query string of the clinic appointment list; parsed by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub page: PageQuery,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Time slot is already booked for this doctor")]
    SlotTaken,

    #[error("Cannot book an appointment in the past")]
    PastSlot,

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Cannot reschedule a {0} appointment")]
    NotReschedulable(AppointmentStatus),

    #[error("You can only manage your own appointments")]
    NotOwner,

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Staff(#[from] StaffError),

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::not_found("Appointment"),
            AppointmentError::DoctorNotFound => AppError::not_found("Doctor"),
            AppointmentError::SlotTaken => AppError::AppointmentConflict,
            AppointmentError::PastSlot => AppError::ValidationError(err.to_string()),
            AppointmentError::InvalidTransition { .. } | AppointmentError::NotReschedulable(_) => {
                AppError::BadRequest(err.to_string())
            }
            AppointmentError::NotOwner => AppError::Forbidden(err.to_string()),
            AppointmentError::Patient(patient) => patient.into(),
            AppointmentError::Staff(staff) => staff.into(),
            AppointmentError::Rejected(app) => app,
            AppointmentError::Store(store) => store.into(),
        }
    }
}
