use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{password, token};
use crate::db::models::{self, User};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = {
        let conn = state.db.get()?;
        models::find_user_by_username(&conn, &req.username)?
    };

    // Unknown user and wrong password are indistinguishable to the caller.
    let user = user.ok_or(AppError::Unauthorized)?;
    if !password::verify(&req.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let access_token = token::issue(
        &user.username,
        &state.config.auth.token_secret,
        state.config.auth.token_hours,
    )?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
