use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Never serialized; responses carry everything but the hash.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_superadmin: bool,
    /// Session ids this user may see. Empty means unrestricted.
    pub allowed_sessions: Vec<String>,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded image payload, stored inline.
    pub image_data: String,
    pub file_size: i64,
    pub uploaded_at: String,
}

impl User {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let allowed_json: String = row.get("allowed_sessions")?;
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            is_superadmin: row.get("is_superadmin")?,
            allowed_sessions: serde_json::from_str(&allowed_json).unwrap_or_default(),
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl Session {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Session {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            is_active: row.get("is_active")?,
        })
    }
}

impl Photo {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Photo {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            filename: row.get("filename")?,
            content_type: row.get("content_type")?,
            image_data: row.get("image_data")?,
            file_size: row.get("file_size")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }
}

// Lookups shared across route modules.

pub fn find_user_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_user_by_id(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![id],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_session(conn: &Connection, id: &str) -> AppResult<Option<Session>> {
    let session = conn
        .query_row(
            "SELECT * FROM sessions WHERE id = ?1",
            params![id],
            Session::from_row,
        )
        .optional()?;
    Ok(session)
}

pub fn find_photo(conn: &Connection, id: &str) -> AppResult<Option<Photo>> {
    let photo = conn
        .query_row(
            "SELECT * FROM photos WHERE id = ?1",
            params![id],
            Photo::from_row,
        )
        .optional()?;
    Ok(photo)
}

pub fn session_exists(conn: &Connection, id: &str) -> AppResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sessions WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}
