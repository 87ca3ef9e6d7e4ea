//! `SessionStore` implementation over the `session_entries` table.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use orangelogic_api::SessionStore;
use rusqlite::{Connection, OptionalExtension};

use super::migrations::run_migrations;

/// Database file name, under `--dir` or the XDG data directory.
const DB_FILE: &str = "session.db";

/// Session store persisted in `SQLite`, scoped to one session ID.
///
/// Several stores (and processes) may share a database; each only sees the
/// entries of its own session ID.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SqliteSessionStore {
    /// Connection guarded for `Sync` access.
    conn: Mutex<Connection>,
    /// Session the entries belong to.
    session_id: String,
}

impl SqliteSessionStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection, session_id: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            session_id: session_id.into(),
        }
    }

    /// Opens (or creates) `session.db` in `dir`, or in
    /// `$XDG_DATA_HOME/orangelogic` when no directory is given, and brings
    /// its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open(dir: Option<&Path>, session_id: impl Into<String>) -> Result<Self> {
        let path = db_path(dir, |key| std::env::var(key).ok())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        run_migrations(&conn).context("database migration failed")?;

        tracing::debug!(path = %path.display(), "Opened session database");
        Ok(Self::new(conn, session_id))
    }

    /// Returns the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Removes every entry of this session and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM session_entries WHERE session_id = ?1",
                rusqlite::params![self.session_id],
            )
            .context("failed to clear session entries")?;
        tracing::debug!(session_id = %self.session_id, removed, "Cleared session");
        Ok(removed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("session database lock poisoned"))
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM session_entries WHERE session_id = ?1 AND key = ?2",
            rusqlite::params![self.session_id, key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read session entry {key}"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session_entries (session_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![self.session_id, key, value, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("failed to write session entry {key}"))?;
        Ok(())
    }

    fn expire(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM session_entries WHERE session_id = ?1 AND key = ?2",
            rusqlite::params![self.session_id, key],
        )
        .with_context(|| format!("failed to expire session entry {key}"))?;
        Ok(())
    }
}

/// Falls back to `$HOME/.local/share` when `XDG_DATA_HOME` is unset.
fn db_path(dir: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.join(DB_FILE));
    }
    let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());
    let base = match lookup("XDG_DATA_HOME") {
        Some(xdg) => PathBuf::from(xdg),
        None => lookup("HOME")
            .map(|home| PathBuf::from(home).join(".local").join("share"))
            .context("neither XDG_DATA_HOME nor HOME is set")?,
    };
    Ok(base.join("orangelogic").join(DB_FILE))
}
