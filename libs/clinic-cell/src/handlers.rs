use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use auth_cell::models::InviteResponse;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::parse_uuid;
use shared_utils::AppState;

use crate::models::{CreateClinicRequest, InviteRequest, UpdateClinicRequest};
use crate::services::{ClinicService, InvitationService};

#[axum::debug_handler]
pub async fn create_clinic(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<CreateClinicRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ClinicService::new(&state);
    let clinic = service.create_clinic(request).await?;
    Ok((StatusCode::CREATED, Json(json!(clinic))))
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);
    let clinics = service.list_clinics(&page).await?;
    Ok(Json(json!(clinics)))
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(state): State<Arc<AppState>>,
    Path(clinic_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let clinic_id = parse_uuid(&clinic_id, "clinic ID")?;
    let service = ClinicService::new(&state);
    let clinic = service.get_clinic(clinic_id).await?;
    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn update_clinic(
    State(state): State<Arc<AppState>>,
    Path(clinic_id): Path<String>,
    ValidJson(request): ValidJson<UpdateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    let clinic_id = parse_uuid(&clinic_id, "clinic ID")?;
    let service = ClinicService::new(&state);
    let clinic = service.update_clinic(clinic_id, request).await?;
    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn delete_clinic(
    State(state): State<Arc<AppState>>,
    Path(clinic_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let clinic_id = parse_uuid(&clinic_id, "clinic ID")?;
    let service = ClinicService::new(&state);
    service.deactivate_clinic(clinic_id).await?;
    Ok(Json(json!({ "message": "Clinic deactivated" })))
}

#[axum::debug_handler]
pub async fn invite_boss(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<String>,
    ValidJson(request): ValidJson<InviteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let clinic_id = parse_uuid(&clinic_id, "clinic ID")?;
    let clinic = ClinicService::new(&state).get_clinic(clinic_id).await?;

    let service = InvitationService::new(&state);
    let invitation = service.invite_boss(&clinic, user.id, &request.email).await?;

    let response = InviteResponse::from_invitation(&invitation, service.frontend_url());
    Ok((StatusCode::CREATED, Json(json!(response))))
}
