//! Password hashing and bearer-token minting for the exam API.
//!
//! Argon2id for credentials, HS256 JWTs for sessions. The token carries
//! only the user id and an expiry; everything else is re-read from the
//! database on each request by the guards.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{DecodingKey, EncodingKey, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("password hashing failed")]
    Hashing,
    #[error("password verification failed")]
    Verification,
    #[error("token encoding failed")]
    TokenEncoding,
    #[error("token decoding failed")]
    TokenDecoding,
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
}

// OWASP first-recommendation parameters: 100 MiB, t=2, p=8.
fn hasher() -> Result<Argon2<'static>, argon2::password_hash::Error> {
    let params = argon2::Params::new(102_400, 2, 8, None)?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub(crate) fn hash_password(plain: &str) -> Result<String, SecurityError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .and_then(|a| a.hash_password(plain.as_bytes(), &salt))
        .map(|h| h.to_string())
        .map_err(|_| SecurityError::Hashing)
}

pub(crate) fn verify_password(plain: &str, stored: &str) -> Result<bool, SecurityError> {
    let parsed = PasswordHash::new(stored).map_err(|_| SecurityError::Verification)?;
    let argon2 = hasher().map_err(|_| SecurityError::Verification)?;
    match argon2.verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(SecurityError::Verification),
    }
}

pub(crate) fn create_access_token(
    user_id: &str,
    settings: &Settings,
    lifetime: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = signing_algorithm(settings)?;
    let ttl = lifetime.unwrap_or_else(|| {
        Duration::minutes(settings.security().access_token_expire_minutes as i64)
    });
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (OffsetDateTime::now_utc() + ttl).unix_timestamp(),
    };
    let key = EncodingKey::from_secret(settings.security().secret_key.as_bytes());
    jsonwebtoken::encode(&jsonwebtoken::Header::new(algorithm), &claims, &key)
        .map_err(|_| SecurityError::TokenEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let mut validation = Validation::new(signing_algorithm(settings)?);
    validation.validate_exp = true;
    validation.required_spec_claims.insert("exp".to_string());
    validation.required_spec_claims.insert("sub".to_string());

    let key = DecodingKey::from_secret(settings.security().secret_key.as_bytes());
    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| SecurityError::TokenDecoding)
}

fn signing_algorithm(settings: &Settings) -> Result<jsonwebtoken::Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(jsonwebtoken::Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}
