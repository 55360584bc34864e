use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

use shared_models::error::AppError;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 \-]{4,18}[0-9]$";

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(email.trim()))
        .unwrap_or(false)
}

pub fn is_valid_phone(phone: &str) -> bool {
    Regex::new(PHONE_PATTERN)
        .map(|re| re.is_match(phone.trim()))
        .unwrap_or(false)
}

/// Path ids arrive as strings so a bad id renders as a JSON `BAD_REQUEST`.
pub fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {}", field)))
}

/// Calendar dates are `YYYY-MM-DD` everywhere in the API.
pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("{} must be a date in YYYY-MM-DD format", field)))
}

pub fn require_text(value: &str, field: &str, max_len: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

pub fn require_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(email)
}

pub fn require_phone(phone: &str) -> Result<String, AppError> {
    let phone = phone.trim();
    if !is_valid_phone(phone) {
        return Err(AppError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(phone.to_string())
}

pub fn require_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}
