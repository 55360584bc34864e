use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::{parse_date, parse_uuid};
use shared_utils::AppState;

use crate::models::{
    AuditLogQuery, CreateExpenseRequest, CreateServiceRequest, DailyReportQuery,
    ImportServicesRequest, MonthQuery, ServiceListQuery, UpdateServiceRequest,
};
use crate::services::{AuditLogService, CatalogService, ExpenseService, ReportService};

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = CatalogService::new(&state)
        .create_service(user.clinic_id()?, &user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(service))))
}

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Value>, AppError> {
    let services = CatalogService::new(&state)
        .list_services(user.clinic_id()?, query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(json!(services)))
}

#[axum::debug_handler]
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service_id = parse_uuid(&service_id, "service ID")?;
    let service = CatalogService::new(&state)
        .get_service(user.clinic_id()?, service_id)
        .await?;
    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<String>,
    ValidJson(request): ValidJson<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let service_id = parse_uuid(&service_id, "service ID")?;
    let service = CatalogService::new(&state)
        .update_service(user.clinic_id()?, service_id, request)
        .await?;
    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service_id = parse_uuid(&service_id, "service ID")?;
    CatalogService::new(&state)
        .deactivate_service(user.clinic_id()?, service_id)
        .await?;
    Ok(Json(json!({ "message": "Service deleted successfully" })))
}

#[axum::debug_handler]
pub async fn import_services(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<ImportServicesRequest>,
) -> Result<Json<Value>, AppError> {
    let report = CatalogService::new(&state)
        .import_services(user.clinic_id()?, &user, request.services)
        .await?;
    Ok(Json(json!(report)))
}

/// Active catalog, as offered to doctors when filling a visit.
#[axum::debug_handler]
pub async fn list_active_services(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let services = CatalogService::new(&state)
        .list_services(user.clinic_id()?, true)
        .await?;
    Ok(Json(json!(services)))
}

// ==============================================================================
// EXPENSES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let expense = ExpenseService::new(&state)
        .create_expense(user.clinic_id()?, &user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(expense))))
}

#[axum::debug_handler]
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Value>, AppError> {
    let month = match (query.year, query.month) {
        (None, None) => None,
        (year, month) => {
            let today = Utc::now().date_naive();
            Some((year.unwrap_or(today.year()), month.unwrap_or(today.month())))
        }
    };

    let expenses = ExpenseService::new(&state)
        .list_expenses(user.clinic_id()?, month)
        .await?;
    Ok(Json(json!(expenses)))
}

#[axum::debug_handler]
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(expense_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let expense_id = parse_uuid(&expense_id, "expense ID")?;
    ExpenseService::new(&state)
        .delete_expense(user.clinic_id()?, expense_id)
        .await?;
    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}

// ==============================================================================
// REPORTS
// ==============================================================================

#[axum::debug_handler]
pub async fn daily_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DailyReportQuery>,
) -> Result<Json<Value>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw, "date")?,
        None => Utc::now().date_naive(),
    };

    let report = ReportService::new(&state)
        .daily_report(user.clinic_id()?, date)
        .await?;
    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn monthly_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    let report = ReportService::new(&state)
        .monthly_report(user.clinic_id()?, year, month)
        .await?;
    Ok(Json(json!(report)))
}

// ==============================================================================
// AUDIT LOG
// ==============================================================================

#[axum::debug_handler]
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Value>, AppError> {
    let entity_id = query
        .entity_id
        .as_deref()
        .map(|raw| parse_uuid(raw, "entity ID"))
        .transpose()?;
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    };

    let logs = AuditLogService::new(&state)
        .list_logs(user.clinic_id()?, query.entity_type.as_deref(), entity_id, &page)
        .await?;
    Ok(Json(json!(logs)))
}
