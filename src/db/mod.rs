pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::auth::password;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Bootstrap credentials, provisioned when no superadmin exists yet.
pub const DEFAULT_SUPERADMIN_USERNAME: &str = "superadmin";
pub const DEFAULT_SUPERADMIN_PASSWORD: &str = "changeme123";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Provision the default superadmin if no superadmin account exists.
/// A convenience for first boot, not a hardened flow; the password is
/// expected to be changed immediately.
pub fn bootstrap_superadmin(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    let superadmin_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE is_superadmin = 1",
        [],
        |row| row.get(0),
    )?;
    if superadmin_exists {
        return Ok(());
    }

    let id = uuid::Uuid::now_v7().to_string();
    let hash = password::hash(DEFAULT_SUPERADMIN_PASSWORD)?;
    conn.execute(
        "INSERT INTO users (id, username, password_hash, is_superadmin, allowed_sessions, created_by)
         VALUES (?1, ?2, ?3, 1, '[]', 'system')",
        params![id, DEFAULT_SUPERADMIN_USERNAME, hash],
    )?;
    tracing::info!(
        "Created initial superadmin user (username: {}, password: {})",
        DEFAULT_SUPERADMIN_USERNAME,
        DEFAULT_SUPERADMIN_PASSWORD
    );
    Ok(())
}
