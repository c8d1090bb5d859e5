//! Password hashing, bearer tokens, and the JWT guard middleware.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use taskhub_core::models::User;
use taskhub_settings::AuthSettings;
use thiserror::Error;
use tracing::warn;

use crate::error::ApiError;
use crate::server::AppState;

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, or expired token.
    #[error("Unauthorized")]
    Unauthorized,
    /// Wrong email or password.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Hashing or signing failed.
    #[error("{0}")]
    Internal(String),
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a candidate password against a stored PHC hash.
pub fn verify_password(candidate: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Internal(format!("Invalid stored password hash: {e}")))?;
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .map_err(|err| match err {
            PasswordHashError::Password => AuthError::InvalidCredentials,
            other => AuthError::Internal(format!("Password verification failed: {other}")),
        })
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// User email at issue time.
    pub email: String,
    /// User role at issue time.
    pub role: String,
    /// Issued-at, seconds since the epoch.
    pub iat: u64,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// Issues and validates HS256 bearer tokens.
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl AuthManager {
    /// Create a manager with an explicit secret.
    pub fn new(secret: &[u8], token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl,
        }
    }

    /// Create from settings. An empty secret gets a random per-process key,
    /// so tokens do not survive a restart.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let ttl = Duration::from_secs(settings.token_ttl_secs);
        if settings.jwt_secret.is_empty() {
            warn!("no JWT secret configured, using a random per-process secret");
            let secret: [u8; 32] = rand::random();
            Self::new(&secret, ttl)
        } else {
            Self::new(settings.jwt_secret.as_bytes(), ttl)
        }
    }

    /// Sign a token for `user`.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("System clock is before UNIX_EPOCH".into()))?;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_owned(),
            iat: now.as_secs(),
            exp: (now + self.token_ttl).as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::Crypto(_) => {
                    AuthError::Internal(format!("Failed to validate token: {err}"))
                }
                _ => AuthError::Unauthorized,
            })
    }

    /// Token lifetime.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Guard for protected routes.
///
/// Passes everything through unless the server requires tokens. Valid claims
/// are added to the request extensions either way.
pub async fn require_jwt(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_token(&request).map(|token| state.auth.validate_token(token));
    match claims {
        Some(Ok(claims)) => {
            let _ = request.extensions_mut().insert(claims);
        }
        Some(Err(AuthError::Internal(detail))) => return Err(ApiError::Internal(detail)),
        Some(Err(_)) | None if state.config.require_token => {
            return Err(AuthError::Unauthorized.into());
        }
        Some(Err(_)) | None => {}
    }
    Ok(next.run(request).await)
}
