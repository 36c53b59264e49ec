use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::password;
use crate::db::models::{self, User};
use crate::error::{AppError, AppResult};
use crate::extractors::Superadmin;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_superadmin: bool,
    #[serde(default)]
    pub allowed_sessions: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_superadmin: Option<bool>,
    pub allowed_sessions: Option<Vec<String>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
}

async fn create_user(
    State(state): State<AppState>,
    Superadmin(admin): Superadmin,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<User>> {
    let conn = state.db.get()?;

    if models::find_user_by_username(&conn, &req.username)?.is_some() {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    validate_allowed_sessions(&conn, &req.allowed_sessions)?;

    let id = uuid::Uuid::now_v7().to_string();
    let hash = password::hash(&req.password)?;
    conn.execute(
        "INSERT INTO users (id, username, password_hash, is_superadmin, allowed_sessions, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            req.username,
            hash,
            req.is_superadmin,
            serde_json::to_string(&req.allowed_sessions)?,
            admin.id
        ],
    )?;

    let user = models::find_user_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

async fn list_users(
    State(state): State<AppState>,
    Superadmin(_admin): Superadmin,
) -> AppResult<Json<Vec<User>>> {
    let conn = state.db.get()?;
    let users = {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY created_at, id")?;
        let rows = stmt.query_map([], User::from_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    Ok(Json(users))
}

async fn update_user(
    State(state): State<AppState>,
    Superadmin(_admin): Superadmin,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    let conn = state.db.get()?;

    let existing = models::find_user_by_id(&conn, &user_id)?.ok_or(AppError::NotFound)?;

    // Validate every supplied field before touching the row, so a rejected
    // request leaves the user exactly as it was.
    if let Some(ref username) = req.username {
        if *username != existing.username
            && models::find_user_by_username(&conn, username)?.is_some()
        {
            return Err(AppError::Conflict("Username already exists".into()));
        }
    }
    if let Some(ref allowed) = req.allowed_sessions {
        validate_allowed_sessions(&conn, allowed)?;
    }

    let username = req.username.unwrap_or(existing.username);
    let password_hash = match req.password {
        Some(ref plaintext) => password::hash(plaintext)?,
        None => existing.password_hash,
    };
    let is_superadmin = req.is_superadmin.unwrap_or(existing.is_superadmin);
    let allowed_sessions = req.allowed_sessions.unwrap_or(existing.allowed_sessions);

    conn.execute(
        "UPDATE users SET username = ?1, password_hash = ?2, is_superadmin = ?3, allowed_sessions = ?4
         WHERE id = ?5",
        params![
            username,
            password_hash,
            is_superadmin,
            serde_json::to_string(&allowed_sessions)?,
            user_id
        ],
    )?;

    let user = models::find_user_by_id(&conn, &user_id)?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Superadmin(admin): Superadmin,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    if user_id == admin.id {
        return Err(AppError::BadRequest("Cannot delete yourself".into()));
    }

    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// Every allow-list entry must name an existing session (active or not);
/// the first unknown id aborts the whole call. Not atomic against a
/// concurrent session delete - an accepted inconsistency window.
fn validate_allowed_sessions(conn: &Connection, session_ids: &[String]) -> AppResult<()> {
    for session_id in session_ids {
        if !models::session_exists(conn, session_id)? {
            return Err(AppError::BadRequest(format!(
                "Session {} not found",
                session_id
            )));
        }
    }
    Ok(())
}
