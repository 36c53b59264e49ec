use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::token;
use crate::db::models::{self, User};
use crate::error::AppError;
use crate::state::AppState;

/// The currently authenticated user, resolved from the bearer token.
/// Returns 401 if the token is missing, invalid, expired, or the user
/// it names no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let username = token::resolve(bearer, &state.config.auth.token_secret)?;

        let conn = state.db.get()?;
        let user = models::find_user_by_username(&conn, &username)?.ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

/// Extractor that additionally requires the superadmin flag.
/// Returns 403 for authenticated non-superadmins.
#[derive(Debug, Clone)]
pub struct Superadmin(pub User);

impl FromRequestParts<AppState> for Superadmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superadmin {
            return Err(AppError::Forbidden);
        }
        Ok(Superadmin(user))
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
