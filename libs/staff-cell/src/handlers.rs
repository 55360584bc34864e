use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::pagination::PageQuery;
use shared_utils::extractor::ValidJson;
use shared_utils::validation::parse_uuid;
use shared_utils::AppState;

use crate::models::{
    CreateContractRequest, CreateSalaryRequest, CreateUserRequest, UpdateContractRequest,
    UpdateSalaryRequest,
};
use crate::services::{ContractService, SalaryService, UserService};

// ==============================================================================
// USERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = UserService::new(&state);
    let profile = service.create_user(user.clinic_id()?, &user, request).await?;
    Ok((StatusCode::CREATED, Json(json!(profile))))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let users = service.list_users(user.clinic_id()?, &page).await?;
    Ok(Json(json!(users)))
}

#[axum::debug_handler]
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_uuid(&user_id, "user ID")?;
    let service = UserService::new(&state);
    service.deactivate_user(user.clinic_id()?, &user, user_id).await?;
    Ok(Json(json!({ "message": "User deactivated" })))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let doctors = service.list_doctors(user.clinic_id()?).await?;
    Ok(Json(json!(doctors)))
}

// ==============================================================================
// CONTRACTS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateContractRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ContractService::new(&state);
    let contract = service.create_contract(user.clinic_id()?, &user, request).await?;
    Ok((StatusCode::CREATED, Json(json!(contract))))
}

#[axum::debug_handler]
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ContractService::new(&state);
    let contracts = service.list_contracts(user.clinic_id()?).await?;
    Ok(Json(json!(contracts)))
}

#[axum::debug_handler]
pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let contract_id = parse_uuid(&contract_id, "contract ID")?;
    let service = ContractService::new(&state);
    let contract = service.get_contract(user.clinic_id()?, contract_id).await?;
    Ok(Json(json!(contract)))
}

#[axum::debug_handler]
pub async fn update_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<String>,
    ValidJson(request): ValidJson<UpdateContractRequest>,
) -> Result<Json<Value>, AppError> {
    let contract_id = parse_uuid(&contract_id, "contract ID")?;
    let service = ContractService::new(&state);
    let contract = service
        .update_contract(user.clinic_id()?, contract_id, request)
        .await?;
    Ok(Json(json!(contract)))
}

#[axum::debug_handler]
pub async fn delete_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let contract_id = parse_uuid(&contract_id, "contract ID")?;
    let service = ContractService::new(&state);
    service.delete_contract(user.clinic_id()?, contract_id).await?;
    Ok(Json(json!({ "message": "Contract deleted" })))
}

// ==============================================================================
// SALARIES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_salary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    ValidJson(request): ValidJson<CreateSalaryRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = SalaryService::new(&state);
    let salary = service.create_salary(user.clinic_id()?, &user, request).await?;
    Ok((StatusCode::CREATED, Json(json!(salary))))
}

#[axum::debug_handler]
pub async fn list_salaries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = SalaryService::new(&state);
    let salaries = service.list_salaries(user.clinic_id()?).await?;
    Ok(Json(json!(salaries)))
}

#[axum::debug_handler]
pub async fn get_salary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(salary_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let salary_id = parse_uuid(&salary_id, "salary ID")?;
    let service = SalaryService::new(&state);
    let salary = service.get_salary(user.clinic_id()?, salary_id).await?;
    Ok(Json(json!(salary)))
}

#[axum::debug_handler]
pub async fn update_salary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(salary_id): Path<String>,
    ValidJson(request): ValidJson<UpdateSalaryRequest>,
) -> Result<Json<Value>, AppError> {
    let salary_id = parse_uuid(&salary_id, "salary ID")?;
    let service = SalaryService::new(&state);
    let salary = service.update_salary(user.clinic_id()?, salary_id, request).await?;
    Ok(Json(json!(salary)))
}

#[axum::debug_handler]
pub async fn delete_salary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(salary_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let salary_id = parse_uuid(&salary_id, "salary ID")?;
    let service = SalaryService::new(&state);
    service.delete_salary(user.clinic_id()?, salary_id).await?;
    Ok(Json(json!({ "message": "Salary deleted" })))
}
