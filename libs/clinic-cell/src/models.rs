use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClinicRequest {
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClinicRequest {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Clinic not found")]
    NotFound,

    #[error("Clinic with this name already exists")]
    NameTaken,

    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::NotFound => AppError::not_found("Clinic"),
            ClinicError::NameTaken => AppError::Conflict(err.to_string()),
            ClinicError::Rejected(app) => app,
            ClinicError::Store(store) => store.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Email delivery is not configured")]
    NotConfigured,

    #[error("Email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email API returned status {0}")]
    Rejected(u16),
}
