//! Access and refresh tokens.
//!
//! Access tokens are short-lived HS256 JWTs. Refresh tokens are opaque
//! random strings; the database keeps only their SHA-256, so a leaked
//! `refresh_sessions` table cannot be replayed.

use calibra_core::hashing::sha256_hex;
use calibra_core::roles::UserRole;
use calibra_core::types::DbId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{env_or, ConfigError};

/// `iss` claim stamped on and required of every access token.
const ISSUER: &str = "calibra";

/// Shortest `JWT_SECRET` accepted at startup (HS256 wants 256 bits).
const MIN_SECRET_BYTES: usize = 32;

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    /// Role name as of login or last refresh.
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    /// Reads `JWT_SECRET` (required, at least 32 bytes),
    /// `JWT_ACCESS_EXPIRY_MINS` (default 15) and `JWT_REFRESH_EXPIRY_DAYS`
    /// (default 7).
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                value: format!("<{} bytes, need {MIN_SECRET_BYTES}>", secret.len()),
            });
        }

        Ok(Self {
            secret,
            access_token_expiry_mins: env_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?,
            refresh_token_expiry_days: env_or(
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
            )?,
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation
    }
}

pub fn generate_access_token(
    user_id: DbId,
    role: UserRole,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        iss: ISSUER.to_string(),
        iat,
        exp: iat + config.access_token_expiry_mins * 60,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature, expiry and issuer; return the claims.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &JwtConfig::validation(),
    )
    .map(|data| data.claims)
}

/// A freshly minted refresh token. `plaintext` goes to the client once;
/// `hash` is what gets stored.
pub struct RefreshToken {
    pub plaintext: String,
    pub hash: String,
}

impl RefreshToken {
    pub fn generate() -> Self {
        let plaintext = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let hash = hash_refresh_token(&plaintext);
        Self { plaintext, hash }
    }
}

pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}
