use crate::error::{AppError, AppResult};

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash(plaintext: &str) -> AppResult<String> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify plaintext against a stored hash - constant-time via bcrypt.
/// Malformed hashes verify as false rather than erroring.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
