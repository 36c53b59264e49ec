use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::access;
use crate::db::models::{self, Session};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct QrResponse {
    /// Base64-encoded SVG, ready for embedding as a data URI.
    pub qr_code: String,
    pub upload_url: String,
}

#[derive(Serialize)]
pub struct PublicCheckResponse {
    pub session_name: String,
    pub session_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).delete(deactivate_session),
        )
        .route("/sessions/{id}/qr", get(session_qr))
        .route("/public/sessions/{id}/check", get(public_check))
}

async fn create_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateSessionRequest>,
) -> AppResult<Json<Session>> {
    let id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO sessions (id, name, description, created_by) VALUES (?1, ?2, ?3, ?4)",
        params![id, req.name, req.description, user.id],
    )?;

    let session = models::find_session(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(session))
}

async fn list_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Session>>> {
    let conn = state.db.get()?;

    // Superadmins and unrestricted users see every active session;
    // everyone else only the active sessions on their allow-list.
    let sessions = if user.is_superadmin || user.allowed_sessions.is_empty() {
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions WHERE is_active = 1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt.query_map([], Session::from_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
    } else {
        let placeholders = vec!["?"; user.allowed_sessions.len()].join(", ");
        let sql = format!(
            "SELECT * FROM sessions WHERE is_active = 1 AND id IN ({}) ORDER BY created_at DESC, id",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(user.allowed_sessions.iter()),
            Session::from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<Session>> {
    let conn = state.db.get()?;
    let session = models::find_session(&conn, &session_id)?.ok_or(AppError::NotFound)?;
    access::ensure_access(&user, &session_id)?;
    Ok(Json(session))
}

async fn session_qr(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<QrResponse>> {
    access::ensure_access(&user, &session_id)?;

    let conn = state.db.get()?;
    if models::find_session(&conn, &session_id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let upload_url = format!(
        "{}/upload/{}",
        state.config.public.base_url.trim_end_matches('/'),
        session_id
    );

    let code = QrCode::new(upload_url.as_bytes()).map_err(|e| {
        tracing::error!("QR code generation failed: {}", e);
        AppError::Internal("QR code generation failed".into())
    })?;

    let qr_svg = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    Ok(Json(QrResponse {
        qr_code: BASE64.encode(qr_svg.as_bytes()),
        upload_url,
    }))
}

async fn deactivate_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<Value>> {
    access::ensure_access(&user, &session_id)?;

    let conn = state.db.get()?;
    // Matching by id alone keeps repeated deactivation idempotent.
    let matched = conn.execute(
        "UPDATE sessions SET is_active = 0 WHERE id = ?1",
        params![session_id],
    )?;
    if matched == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "Session deactivated successfully" })))
}

/// Anonymous endpoint used by upload clients to confirm a session is live
/// before offering the upload form.
async fn public_check(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<PublicCheckResponse>> {
    let conn = state.db.get()?;
    let session = models::find_session(&conn, &session_id)?
        .filter(|s| s.is_active)
        .ok_or(AppError::NotFound)?;

    Ok(Json(PublicCheckResponse {
        session_name: session.name,
        session_id,
    }))
}
