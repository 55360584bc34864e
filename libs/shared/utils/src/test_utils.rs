use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, Role, User, UserRecord};

use crate::state::AppState;

pub struct TestConfig {
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub upload_dir: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_access_secret: "test-access-secret-key-for-jwt-validation-long-enough".to_string(),
            jwt_refresh_secret: "test-refresh-secret-key-for-jwt-validation-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            upload_dir: std::env::temp_dir().join("clinic-uploads").display().to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the store client at a mock server.
    pub fn with_store(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::from_lookup(|_| None);
        config.environment = "test".to_string();
        config.supabase_url = self.supabase_url.clone();
        config.supabase_service_key = self.supabase_service_key.clone();
        config.jwt_access_secret = self.jwt_access_secret.clone();
        config.jwt_refresh_secret = self.jwt_refresh_secret.clone();
        config.upload_dir = self.upload_dir.clone();
        config.store_timeout_secs = 2;
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    /// Full application state with a running audit worker. Needs a tokio runtime.
    pub fn to_state(&self) -> Arc<AppState> {
        AppState::new(self.to_app_config()).0
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub clinic_id: Option<Uuid>,
}

impl TestUser {
    pub fn new(email: &str, role: Role, clinic_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            clinic_id,
        }
    }

    pub fn superadmin() -> Self {
        Self::new("admin@crm.local", Role::Superadmin, None)
    }

    pub fn boss(clinic_id: Uuid) -> Self {
        Self::new("boss@clinic.test", Role::Boss, Some(clinic_id))
    }

    pub fn doctor(clinic_id: Uuid) -> Self {
        Self::new("doctor@clinic.test", Role::Doctor, Some(clinic_id))
    }

    pub fn receptionist(clinic_id: Uuid) -> Self {
        Self::new("desk@clinic.test", Role::Receptionist, Some(clinic_id))
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            clinic_id: self.clinic_id,
        }
    }

    pub fn to_record(&self) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email.clone(),
            phone: None,
            password_hash: String::new(),
            first_name: "Test".to_string(),
            last_name: self.role.as_str().to_string(),
            role: self.role,
            clinic_id: self.clinic_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));
        let issued = if exp < now { exp - Duration::hours(1) } else { now };

        let claims = JwtClaims {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            clinic_id: user.clinic_id.map(|id| id.to_string()),
            exp: exp.timestamp(),
            iat: issued.timestamp(),
            nbf: issued.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .unwrap_or_default()
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser, config: &TestConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_access_secret, None))
    }
}

/// Rows shaped the way PostgREST returns them for each table.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn user_row(user: &TestUser, password_hash: &str) -> Value {
        json!({
            "id": user.id,
            "email": user.email,
            "phone": null,
            "password_hash": password_hash,
            "first_name": "Test",
            "last_name": user.role.as_str(),
            "role": user.role,
            "clinic_id": user.clinic_id,
            "is_active": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn clinic_row(clinic_id: Uuid) -> Value {
        json!({
            "id": clinic_id,
            "name": "Smile Dental",
            "timezone": "Asia/Tashkent",
            "address": "1 Main St",
            "phone": "+998901234567",
            "is_active": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn patient_row(clinic_id: Uuid, patient_id: Uuid) -> Value {
        json!({
            "id": patient_id,
            "clinic_id": clinic_id,
            "first_name": "Aziz",
            "last_name": "Karimov",
            "phone": "+998901112233",
            "dob": "1990-05-01",
            "gender": "male",
            "address": null,
            "notes": null,
            "is_active": true,
            "created_by": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        clinic_id: Uuid,
        appointment_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        start_time: &str,
        status: &str,
    ) -> Value {
        let start = chrono::DateTime::parse_from_rfc3339(start_time)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let end = start + Duration::minutes(30);

        json!({
            "id": appointment_id,
            "clinic_id": clinic_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": start.format("%Y-%m-%d").to_string(),
            "start_time": start,
            "end_time": end,
            "status": status,
            "notes": null,
            "created_by": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn service_row(clinic_id: Uuid, service_id: Uuid, name: &str, price: f64) -> Value {
        json!({
            "id": service_id,
            "clinic_id": clinic_id,
            "name": name,
            "description": null,
            "price": price,
            "duration": 30,
            "is_active": true,
            "created_by": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn contract_row(clinic_id: Uuid, doctor_id: Uuid, share: f64, start_date: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "clinic_id": clinic_id,
            "doctor_id": doctor_id,
            "share_percentage": share,
            "start_date": start_date,
            "end_date": null,
            "is_active": true,
            "notes": null,
            "created_by": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn visit_row(clinic_id: Uuid, visit_id: Uuid, doctor_id: Uuid, patient_id: Uuid, status: &str) -> Value {
        json!({
            "id": visit_id,
            "clinic_id": clinic_id,
            "appointment_id": null,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": "2025-03-01",
            "status": status,
            "diagnosis": null,
            "notes": null,
            "comment": null,
            "affected_teeth": [],
            "plan_steps": [],
            "xray_images": [],
            "services": [],
            "subtotal": 0.0,
            "discount_type": "none",
            "discount_value": 0.0,
            "discount_amount": 0.0,
            "total": 0.0,
            "doctor_share": 0.0,
            "doctor_earning": 0.0,
            "payment_type": null,
            "created_at": "2025-03-01T09:00:00Z",
            "updated_at": "2025-03-01T09:00:00Z",
            "completed_at": null
        })
    }
}
