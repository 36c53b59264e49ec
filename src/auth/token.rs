use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, AppResult};

/// Bearer token claims: the username and an expiry. No revocation list;
/// tokens are only ever invalidated by expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// Issue a signed HS256 bearer token for a username, expiring `hours` from now.
pub fn issue(username: &str, secret: &str, hours: u64) -> AppResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(format!("System clock error: {}", e)))?
        .as_secs();

    let claims = Claims {
        sub: username.to_string(),
        exp: now + hours * 3600,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

/// Resolve a token back to its username. Any failure - bad signature,
/// malformed token, expired - maps to Unauthorized.
pub fn resolve(token: &str, secret: &str) -> AppResult<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.sub)
    .map_err(|_| AppError::Unauthorized)
}
