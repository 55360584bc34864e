use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

tokio::task_local! {
    /// Id of the request currently being served, set by the request-id middleware.
    pub static REQUEST_ID: String;
}

/// Returns the request id of the current task, or an empty string outside a request.
pub fn current_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Time slot is already booked for this doctor")]
    AppointmentConflict,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Invitation has expired")]
    InviteExpired,

    #[error("Invitation has already been used")]
    InviteUsed,

    #[error("Diagnosis is required to complete the visit")]
    DiagnosisRequired,

    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{} not found", resource))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_)
            | AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::ValidationError(_)
            | AppError::InviteExpired
            | AppError::InviteUsed
            | AppError::DiagnosisRequired
            | AppError::InvalidDiscount(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::AppointmentConflict => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) | AppError::ExternalService(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AppointmentConflict => "APPOINTMENT_CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::InviteExpired => "INVITE_EXPIRED",
            AppError::InviteUsed => "INVITE_USED",
            AppError::DiagnosisRequired => "DIAGNOSIS_REQUIRED",
            AppError::InvalidDiscount(_) => "INVALID_DISCOUNT",
            AppError::Internal(_) | AppError::Database(_) | AppError::ExternalService(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Message safe to show to clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidDiscount(msg) => msg.clone(),
            AppError::Internal(_) | AppError::Database(_) | AppError::ExternalService(_) => {
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// JSON body shared by every error response, including recovered panics.
pub fn error_body(code: &str, message: &str, request_id: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "request_id": request_id,
        }
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = current_request_id();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, code = self.code(), "{}", self);
        } else {
            tracing::debug!(request_id = %request_id, code = self.code(), "{}", self);
        }

        let body = Json(error_body(self.code(), &self.public_message(), &request_id));

        (status, body).into_response()
    }
}
