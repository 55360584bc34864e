use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, User, UserRecord};
use shared_models::error::AppError;

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// HS256 issuer and verifier. Access and refresh tokens are signed with separate secrets.
#[derive(Clone)]
pub struct JwtService {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_secret: config.jwt_access_secret.clone(),
            refresh_secret: config.jwt_refresh_secret.clone(),
            access_ttl: Duration::seconds(config.jwt_access_ttl_secs),
            refresh_ttl: Duration::seconds(config.jwt_refresh_ttl_secs),
        }
    }

    pub fn issue_pair(&self, user: &UserRecord) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: sign(user, &self.access_secret, self.access_ttl)?,
            refresh_token: sign(user, &self.refresh_secret, self.refresh_ttl)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn validate_access(&self, token: &str) -> Result<User, AppError> {
        claims_to_user(validate_token(token, &self.access_secret)?)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<User, AppError> {
        claims_to_user(validate_token(token, &self.refresh_secret)?)
    }
}

fn sign(user: &UserRecord, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = JwtClaims {
        user_id: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        clinic_id: user.clinic_id.map(|id| id.to_string()),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn validate_token(token: &str, secret: &str) -> Result<JwtClaims, AppError> {
    if secret.is_empty() {
        return Err(AppError::Internal("JWT secret is not set".to_string()));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_nbf = true;

    decode::<JwtClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                debug!("Token expired");
                AppError::TokenExpired
            }
            other => {
                debug!("Token rejected: {:?}", other);
                AppError::TokenInvalid
            }
        })
}

fn claims_to_user(claims: JwtClaims) -> Result<User, AppError> {
    let id = Uuid::parse_str(&claims.user_id).map_err(|_| AppError::TokenInvalid)?;
    let clinic_id = claims
        .clinic_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| AppError::TokenInvalid)?;

    Ok(User {
        id,
        email: claims.email,
        role: claims.role,
        clinic_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};
    use assert_matches::assert_matches;

    #[test]
    fn issued_access_token_round_trips_principal() {
        let config = TestConfig::default().to_app_config();
        let service = JwtService::new(&config);
        let boss = TestUser::boss(Uuid::new_v4());

        let pair = service.issue_pair(&boss.to_record()).unwrap();
        let user = service.validate_access(&pair.access_token).unwrap();

        assert_eq!(user, boss.to_user());
        assert_eq!(pair.expires_in, config.jwt_access_ttl_secs);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let config = TestConfig::default().to_app_config();
        let service = JwtService::new(&config);
        let pair = service.issue_pair(&TestUser::superadmin().to_record()).unwrap();

        assert_matches!(service.validate_access(&pair.refresh_token), Err(AppError::TokenInvalid));
        assert!(service.validate_refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn expired_and_tampered_tokens_have_distinct_errors() {
        let config = TestConfig::default();
        let user = TestUser::doctor(Uuid::new_v4());

        let expired = JwtTestUtils::create_expired_token(&user, &config.jwt_access_secret);
        assert_matches!(validate_token(&expired, &config.jwt_access_secret), Err(AppError::TokenExpired));

        let forged = JwtTestUtils::create_invalid_signature_token(&user);
        assert_matches!(validate_token(&forged, &config.jwt_access_secret), Err(AppError::TokenInvalid));

        let malformed = JwtTestUtils::create_malformed_token();
        assert_matches!(validate_token(&malformed, &config.jwt_access_secret), Err(AppError::TokenInvalid));
    }
}
