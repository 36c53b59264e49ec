//! Session access-control evaluator.
//!
//! The allow-list policy: superadmins see everything; a user with an empty
//! `allowed_sessions` list is unrestricted (empty means "all", not "none" -
//! a deliberate policy choice); otherwise access is plain list membership.
//! The evaluator never touches the store and never checks that the session
//! id actually exists.

use crate::db::models::User;
use crate::error::{AppError, AppResult};

pub fn can_access(user: &User, session_id: &str) -> bool {
    if user.is_superadmin {
        return true;
    }
    if user.allowed_sessions.is_empty() {
        return true;
    }
    user.allowed_sessions.iter().any(|id| id == session_id)
}

/// Gate form of [`can_access`]: denial surfaces as `Forbidden`.
pub fn ensure_access(user: &User, session_id: &str) -> AppResult<()> {
    if can_access(user, session_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
