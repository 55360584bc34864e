use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::state::AppState;

// =====================================================================================
// AUTHENTICATION
// =====================================================================================

/// Validates the bearer access token and stores the principal in request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = match bearer {
        Some(header) => header,
        None if request.headers().contains_key(axum::http::header::AUTHORIZATION) => {
            return Err(AppError::Auth("Invalid authorization header format".to_string()));
        }
        None => return Err(AppError::Auth("Missing authorization header".to_string())),
    };

    let user = state.jwt.validate_access(bearer.token())?;
    debug!(user_id = %user.id, role = %user.role, "Authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

// =====================================================================================
// TENANT ISOLATION
// =====================================================================================

/// Every non-superadmin must carry a clinic in the token. Superadmins pass through.
pub async fn tenant_isolation(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    if !user.is_superadmin() {
        user.clinic_id()?;
    }
    Ok(next.run(request).await)
}

// =====================================================================================
// ROLE GUARDS
// =====================================================================================

async fn require_roles(allowed: &[Role], request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    if !allowed.contains(&user.role) {
        debug!(user_id = %user.id, role = %user.role, "Role not permitted");
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }
    Ok(next.run(request).await)
}

pub async fn superadmin_only(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Superadmin], request, next).await
}

pub async fn boss_only(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Boss], request, next).await
}

pub async fn doctor_only(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Doctor], request, next).await
}

pub async fn boss_or_receptionist(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Boss, Role::Receptionist], request, next).await
}

pub async fn clinic_staff(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Boss, Role::Doctor, Role::Receptionist], request, next).await
}

// =====================================================================================
// JSON BODIES
// =====================================================================================

/// `Json<T>` whose rejections render as `VALIDATION_ERROR` in the standard error body.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}
