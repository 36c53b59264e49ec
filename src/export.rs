//! Bulk photo export: package a caller-selected set of photos into a single
//! deflate ZIP archive.
//!
//! Partial results are intentional: missing photos and photos whose owning
//! session the caller may not see are dropped silently, and a photo that
//! fails to decode or write is logged and skipped rather than aborting the
//! archive. The archive is assembled completely in memory before any byte
//! reaches the client.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::access;
use crate::db::models::{self, Photo, User};
use crate::error::{AppError, AppResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Build the export archive for `photo_ids` as requested by `user`.
/// Returns the ZIP bytes and the download filename.
pub fn build_archive(
    conn: &Connection,
    user: &User,
    photo_ids: &[String],
) -> AppResult<(Vec<u8>, String)> {
    if photo_ids.is_empty() {
        return Err(AppError::BadRequest("No photo IDs provided".into()));
    }

    // Fetch in input order, dropping missing and inaccessible photos.
    let mut photos = Vec::new();
    for photo_id in photo_ids {
        let Some(photo) = models::find_photo(conn, photo_id)? else {
            continue;
        };
        if !access::can_access(user, &photo.session_id) {
            continue;
        }
        photos.push(photo);
    }

    if photos.is_empty() {
        return Err(AppError::NotFound);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for photo in &photos {
        if let Err(e) = add_entry(&mut writer, photo, options) {
            tracing::error!("Error adding photo {} to archive: {}", photo.id, e);
        }
    }

    let bytes = writer.finish()?.into_inner();

    // Name the archive after the first photo's session.
    let session_name = models::find_session(conn, &photos[0].session_id)?
        .map(|s| sanitize_session_name(&s.name))
        .unwrap_or_else(|| "photos".to_string());

    Ok((bytes, format!("{}_photos.zip", session_name)))
}

fn add_entry(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    photo: &Photo,
    options: SimpleFileOptions,
) -> AppResult<()> {
    let image_bytes = BASE64
        .decode(&photo.image_data)
        .map_err(|e| AppError::Internal(format!("Invalid base64 payload: {}", e)))?;

    writer.start_file(
        entry_name(&photo.filename, &photo.content_type, &photo.uploaded_at),
        options,
    )?;
    writer.write_all(&image_bytes)?;
    Ok(())
}

/// Derive a collision-resistant archive entry name: ensure a recognized
/// image extension (from the content-type when the filename lacks one,
/// defaulting to jpg) and append the upload timestamp to the stem.
fn entry_name(filename: &str, content_type: &str, uploaded_at: &str) -> String {
    let lower = filename.to_lowercase();
    let has_image_ext = IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)));

    let named = if has_image_ext {
        filename.to_string()
    } else {
        format!("{}.{}", filename, extension_for(content_type))
    };

    // Safe: `named` always contains a '.' at this point.
    let (stem, ext) = named.rsplit_once('.').unwrap();
    format!("{}_{}.{}", stem, archive_timestamp(uploaded_at), ext)
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        "jpg"
    } else if content_type.contains("png") {
        "png"
    } else if content_type.contains("gif") {
        "gif"
    } else {
        "jpg"
    }
}

/// Compact `YYYYMMDD_HHMMSS` form of the upload timestamp. Unparseable
/// timestamps degrade to a filename-safe prefix of the raw string.
fn archive_timestamp(uploaded_at: &str) -> String {
    let parsed = NaiveDateTime::parse_from_str(uploaded_at, "%Y-%m-%d %H:%M:%S").or_else(|_| {
        chrono::DateTime::parse_from_rfc3339(uploaded_at).map(|dt| dt.naive_utc())
    });

    match parsed {
        Ok(dt) => dt.format("%Y%m%d_%H%M%S").to_string(),
        Err(_) if uploaded_at.is_empty() => "unknown".to_string(),
        Err(_) => {
            let safe: String = uploaded_at
                .chars()
                .take(19)
                .map(|c| if c == ':' || c == '.' { '-' } else { c })
                .collect();
            safe
        }
    }
}

fn sanitize_session_name(name: &str) -> String {
    name.replace(' ', "_").replace('/', "_")
}
