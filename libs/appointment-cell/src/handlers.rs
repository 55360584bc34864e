use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::{parse_date, parse_uuid};
use shared_utils::AppState;

use crate::models::{
    AppointmentFilter, AppointmentListQuery, AppointmentStatus, CreateAppointmentRequest,
    RescheduleRequest, ScheduleQuery, StatusUpdateRequest,
};
use crate::services::AppointmentBookingService;

// ==============================================================================
// FRONT DESK
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service.book_appointment(user.clinic_id()?, &user, request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = AppointmentFilter {
        date: query.date.as_deref().map(|d| parse_date(d, "date")).transpose()?,
        doctor_id: query.doctor_id.as_deref().map(|d| parse_uuid(d, "doctor ID")).transpose()?,
        status: query.status.as_deref().map(str::parse::<AppointmentStatus>).transpose()?,
        page: PageQuery {
            page: query.page,
            page_size: query.page_size,
        },
    };

    let service = AppointmentBookingService::new(&state);
    let page = service.list_appointments(user.clinic_id()?, &filter).await?;
    Ok(Json(json!(page)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_uuid(&appointment_id, "appointment ID")?;
    let service = AppointmentBookingService::new(&state);
    let appointment = service.get_appointment_view(user.clinic_id()?, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    ValidJson(request): ValidJson<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_uuid(&appointment_id, "appointment ID")?;
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .reschedule_appointment(user.clinic_id()?, appointment_id, request.start_time)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_uuid(&appointment_id, "appointment ID")?;
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .cancel_appointment(user.clinic_id()?, &user, appointment_id)
        .await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// DOCTOR
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw, "date")?,
        None => Utc::now().date_naive(),
    };

    let service = AppointmentBookingService::new(&state);
    let schedule = service.doctor_schedule(user.clinic_id()?, user.id, date).await?;
    Ok(Json(json!({ "date": date, "appointments": schedule })))
}

#[axum::debug_handler]
pub async fn update_own_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    ValidJson(request): ValidJson<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_uuid(&appointment_id, "appointment ID")?;
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .update_status_as_doctor(user.clinic_id()?, &user, appointment_id, request.status)
        .await?;
    Ok(Json(json!(appointment)))
}
