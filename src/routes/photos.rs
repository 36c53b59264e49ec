use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::access;
use crate::db::models::{self, Photo};
use crate::error::{AppError, AppResult};
use crate::export;
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UploadRequest {
    pub session_id: String,
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded image payload, stored as-is.
    pub image_data: String,
    /// Declared by the uploader and trusted as-is.
    pub file_size: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/photos", post(upload_photo))
        .route("/photos/session/{id}", get(photos_by_session))
        .route("/photos/{id}", get(get_photo).delete(delete_photo))
        .route("/photos/bulk-download", post(bulk_download))
}

/// Anonymous guest upload. The session must exist and be active at this
/// moment; it is not re-validated on later reads.
async fn upload_photo(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> AppResult<Json<Photo>> {
    let conn = state.db.get()?;

    let live = models::find_session(&conn, &req.session_id)?
        .map(|s| s.is_active)
        .unwrap_or(false);
    if !live {
        return Err(AppError::NotFound);
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO photos (id, session_id, filename, content_type, image_data, file_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            req.session_id,
            req.filename,
            req.content_type,
            req.image_data,
            req.file_size
        ],
    )?;

    let photo = models::find_photo(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(photo))
}

async fn photos_by_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<Vec<Photo>>> {
    access::ensure_access(&user, &session_id)?;

    let conn = state.db.get()?;
    let photos = {
        let mut stmt = conn.prepare(
            "SELECT * FROM photos WHERE session_id = ?1 ORDER BY uploaded_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![session_id], Photo::from_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    Ok(Json(photos))
}

async fn get_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<String>,
) -> AppResult<Json<Photo>> {
    let conn = state.db.get()?;
    let photo = models::find_photo(&conn, &photo_id)?.ok_or(AppError::NotFound)?;

    // Access is evaluated against the owning session, so a photo cannot be
    // read via its direct id by a caller locked out of that session.
    access::ensure_access(&user, &photo.session_id)?;
    Ok(Json(photo))
}

async fn delete_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<String>,
) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    let photo = models::find_photo(&conn, &photo_id)?.ok_or(AppError::NotFound)?;
    access::ensure_access(&user, &photo.session_id)?;

    let deleted = conn.execute("DELETE FROM photos WHERE id = ?1", params![photo_id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "Photo deleted successfully" })))
}

/// Package the requested photos into a ZIP archive. The archive is built
/// completely before the response starts; see [`crate::export`] for the
/// partial-result semantics.
async fn bulk_download(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(photo_ids): Json<Vec<String>>,
) -> AppResult<Response> {
    let (bytes, filename) = {
        let conn = state.db.get()?;
        export::build_archive(&conn, &user, &photo_ids)?
    };

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes).into_response())
}
