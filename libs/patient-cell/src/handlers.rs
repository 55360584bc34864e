use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::parse_uuid;
use shared_utils::AppState;

use crate::models::{CreatePatientRequest, ImportPatientsRequest, PatientListQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = PatientService::new(&state);
    let patient = service.create_patient(user.clinic_id()?, &user, request).await?;
    Ok((StatusCode::CREATED, Json(json!(patient))))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let page = service.list_patients(user.clinic_id()?, &query).await?;
    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_uuid(&patient_id, "patient ID")?;
    let service = PatientService::new(&state);
    let patient = service.get_patient(user.clinic_id()?, patient_id).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    ValidJson(request): ValidJson<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_uuid(&patient_id, "patient ID")?;
    let service = PatientService::new(&state);
    let patient = service.update_patient(user.clinic_id()?, patient_id, request).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_uuid(&patient_id, "patient ID")?;
    let service = PatientService::new(&state);
    service.deactivate_patient(user.clinic_id()?, patient_id).await?;
    Ok(Json(json!({ "message": "Patient deleted successfully" })))
}

#[axum::debug_handler]
pub async fn import_patients(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<ImportPatientsRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let report = service.import_patients(user.clinic_id()?, &user, request.patients).await?;
    Ok(Json(json!(report)))
}
