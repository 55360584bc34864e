use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_ACCESS_SECRET: &str = "change-me-access-secret-32chars!";
pub const DEFAULT_REFRESH_SECRET: &str = "change-me-refresh-secret-32char!";
const DEV_SUPERADMIN_EMAIL: &str = "admin@crm.local";
const DEV_SUPERADMIN_PASSWORD: &str = "Admin123!";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT secrets must be changed from default values in production")]
    DefaultSecret,

    #[error("{name} must be at least 32 characters in production (got {len})")]
    SecretTooShort { name: &'static str, len: usize },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub service_name: String,
    pub server_port: u16,

    pub supabase_url: String,
    pub supabase_service_key: String,
    pub store_timeout_secs: u64,

    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_access_ttl_secs: i64,
    pub jwt_refresh_ttl_secs: i64,

    pub superadmin_email: String,
    pub superadmin_password: String,

    pub frontend_url: String,
    pub allowed_origins: Vec<String>,

    pub resend_api_key: String,
    pub resend_base_url: String,
    pub upload_dir: String,
    pub audit_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let is_production = environment == "production";

        let frontend_url = lookup("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let (superadmin_email, superadmin_password) = match (
            lookup("SUPERADMIN_EMAIL"),
            lookup("SUPERADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => (email, password),
            (email, password) if !is_production => (
                email.unwrap_or_else(|| DEV_SUPERADMIN_EMAIL.to_string()),
                password.unwrap_or_else(|| DEV_SUPERADMIN_PASSWORD.to_string()),
            ),
            _ => {
                warn!("SUPERADMIN_EMAIL/SUPERADMIN_PASSWORD not set, superadmin seed disabled");
                (String::new(), String::new())
            }
        };

        let config = Self {
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "clinic-backend".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080),

            supabase_url: lookup("SUPABASE_URL").unwrap_or_else(|| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            }),
            supabase_service_key: lookup("SUPABASE_SERVICE_KEY").unwrap_or_else(|| {
                warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                String::new()
            }),
            store_timeout_secs: parse_or(&lookup, "STORE_TIMEOUT_SECS", 10),

            jwt_access_secret: lookup("JWT_ACCESS_SECRET").unwrap_or_else(|| {
                warn!("JWT_ACCESS_SECRET not set, using development default");
                DEFAULT_ACCESS_SECRET.to_string()
            }),
            jwt_refresh_secret: lookup("JWT_REFRESH_SECRET").unwrap_or_else(|| {
                warn!("JWT_REFRESH_SECRET not set, using development default");
                DEFAULT_REFRESH_SECRET.to_string()
            }),
            jwt_access_ttl_secs: parse_or(&lookup, "JWT_ACCESS_TTL_SECS", 15 * 60),
            jwt_refresh_ttl_secs: parse_or(&lookup, "JWT_REFRESH_TTL_SECS", 7 * 24 * 60 * 60),

            superadmin_email,
            superadmin_password,

            allowed_origins: build_allowed_origins(
                &frontend_url,
                is_production,
                lookup("ALLOWED_ORIGINS").as_deref(),
            ),
            frontend_url,

            resend_api_key: lookup("RESEND_API_KEY").unwrap_or_default(),
            resend_base_url: lookup("RESEND_BASE_URL")
                .unwrap_or_else(|| "https://api.resend.com".to_string()),
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            audit_queue_capacity: parse_or(&lookup, "AUDIT_QUEUE_CAPACITY", 1024),

            environment,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing store environment variables");
        }

        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.resend_api_key.is_empty()
    }

    pub fn seed_enabled(&self) -> bool {
        !self.superadmin_email.is_empty() && !self.superadmin_password.is_empty()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Production refuses to start with default or short JWT secrets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_production() {
            return Ok(());
        }

        for secret in [&self.jwt_access_secret, &self.jwt_refresh_secret] {
            if secret == DEFAULT_ACCESS_SECRET || secret == DEFAULT_REFRESH_SECRET {
                return Err(ConfigError::DefaultSecret);
            }
        }

        if self.jwt_access_secret.len() < 32 {
            return Err(ConfigError::SecretTooShort {
                name: "JWT_ACCESS_SECRET",
                len: self.jwt_access_secret.len(),
            });
        }
        if self.jwt_refresh_secret.len() < 32 {
            return Err(ConfigError::SecretTooShort {
                name: "JWT_REFRESH_SECRET",
                len: self.jwt_refresh_secret.len(),
            });
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

fn build_allowed_origins(frontend_url: &str, is_production: bool, extra: Option<&str>) -> Vec<String> {
    let mut origins = Vec::new();

    if !frontend_url.is_empty() {
        origins.push(frontend_url.to_string());
    }

    if !is_production {
        for local in ["http://localhost:3000", "http://localhost:3001", "http://127.0.0.1:3000"] {
            origins.push(local.to_string());
        }
    }

    if let Some(extra) = extra {
        origins.extend(
            extra
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string),
        );
    }

    origins.sort();
    origins.dedup();
    origins
}
