use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;
use shared_utils::extractor::ValidJson;
use shared_utils::AppState;

use crate::models::{AcceptInviteRequest, LoginRequest, RefreshRequest};
use crate::services::AuthService;

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&state);
    let response = service.login(request).await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&state);
    let response = service.refresh(request).await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<AcceptInviteRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&state);
    let response = service.accept_invite(request).await?;
    Ok(Json(json!(response)))
}
