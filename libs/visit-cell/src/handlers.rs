use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::{parse_date, parse_uuid};
use shared_utils::AppState;

use crate::models::{
    CompleteVisitRequest, CreateTreatmentPlanRequest, DeleteImageRequest, PlanListQuery, PlanStatus,
    SaveDraftRequest, StartVisitRequest, UpdatePlanStepRequest, VisitListQuery,
};
use crate::services::{ImageStore, TreatmentPlanService, VisitService};

// ==============================================================================
// VISITS
// ==============================================================================

#[axum::debug_handler]
pub async fn start_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<StartVisitRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let visit = VisitService::new(&state)
        .start_visit(user.clinic_id()?, &user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(visit))))
}

#[axum::debug_handler]
pub async fn list_visits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<VisitListQuery>,
) -> Result<Json<Value>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw, "date")?,
        None => Utc::now().date_naive(),
    };

    let visits = VisitService::new(&state)
        .list_visits(user.clinic_id()?, &user, date)
        .await?;
    Ok(Json(json!(visits)))
}

#[axum::debug_handler]
pub async fn get_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let visit_id = parse_uuid(&visit_id, "visit ID")?;
    let visit = VisitService::new(&state)
        .get_visit(user.clinic_id()?, &user, visit_id)
        .await?;
    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<String>,
    ValidJson(request): ValidJson<SaveDraftRequest>,
) -> Result<Json<Value>, AppError> {
    let visit_id = parse_uuid(&visit_id, "visit ID")?;
    let visit = VisitService::new(&state)
        .save_draft(user.clinic_id()?, &user, visit_id, request)
        .await?;
    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn complete_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<String>,
    ValidJson(request): ValidJson<CompleteVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let visit_id = parse_uuid(&visit_id, "visit ID")?;
    let visit = VisitService::new(&state)
        .complete_visit(user.clinic_id()?, &user, visit_id, request)
        .await?;
    Ok(Json(json!(visit)))
}

// ==============================================================================
// TREATMENT PLANS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateTreatmentPlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let plan = TreatmentPlanService::new(&state)
        .create_plan(user.clinic_id()?, &user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(plan))))
}

/// With `patient_id` every plan of that patient, otherwise the caller's own plans.
#[axum::debug_handler]
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<PlanListQuery>,
) -> Result<Json<Value>, AppError> {
    let clinic_id = user.clinic_id()?;
    let service = TreatmentPlanService::new(&state);

    let plans = match query.patient_id.as_deref() {
        Some(raw) => {
            let patient_id = parse_uuid(raw, "patient ID")?;
            service.list_by_patient(clinic_id, patient_id).await?
        }
        None => {
            let status = query.status.as_deref().map(PlanStatus::parse).transpose()?;
            service.list_by_doctor(clinic_id, user.id, status).await?
        }
    };
    Ok(Json(json!(plans)))
}

#[axum::debug_handler]
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(plan_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let plan_id = parse_uuid(&plan_id, "treatment plan ID")?;
    let plan = TreatmentPlanService::new(&state)
        .get_plan_view(user.clinic_id()?, plan_id)
        .await?;
    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn update_plan_step(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((plan_id, step)): Path<(String, String)>,
    ValidJson(request): ValidJson<UpdatePlanStepRequest>,
) -> Result<Json<Value>, AppError> {
    let plan_id = parse_uuid(&plan_id, "treatment plan ID")?;
    let step_number: u32 = step
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid step number".to_string()))?;

    let plan = TreatmentPlanService::new(&state)
        .update_step(user.clinic_id()?, plan_id, step_number, request)
        .await?;
    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn delete_plan(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(plan_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let plan_id = parse_uuid(&plan_id, "treatment plan ID")?;
    TreatmentPlanService::new(&state)
        .delete_plan(user.clinic_id()?, plan_id)
        .await?;
    Ok(Json(json!({ "message": "Treatment plan deleted successfully" })))
}

// ==============================================================================
// UPLOADS
// ==============================================================================

#[axum::debug_handler]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let stored = ImageStore::new(state.config.upload_dir.as_str())
            .save(&original_name, &bytes)
            .await?;
        return Ok(Json(json!(stored)));
    }

    Err(AppError::BadRequest("No image file provided".to_string()))
}

#[axum::debug_handler]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<User>,
    ValidJson(request): ValidJson<DeleteImageRequest>,
) -> Result<Json<Value>, AppError> {
    ImageStore::new(state.config.upload_dir.as_str())
        .remove(&request.url)
        .await?;
    Ok(Json(json!({ "message": "Image deleted" })))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest("Image file too large (max 10MB)".to_string())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}
