use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::store::{DocumentStore, Listeners, Subscription};

/// SQLite-backed document store: one row per path, value kept as JSON text.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    listeners: Listeners,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            listeners: Listeners::default(),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the value at `path` was last written, as RFC 3339.
    pub fn updated_at(&self, path: &str) -> Result<Option<String>> {
        let ts = self
            .conn()
            .query_row(
                "SELECT updated_at FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            PRAGMA user_version = 1;",
        )?;
    }

    Ok(())
}

impl DocumentStore for SqliteStore {
    fn read(&self, path: &str) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read {path}"))?;
        match text {
            Some(t) => {
                let value = serde_json::from_str(&t)
                    .with_context(|| format!("Stored value at {path} is not valid JSON"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn write(&self, path: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            self.conn()
                .execute("DELETE FROM documents WHERE path = ?1", params![path])
                .with_context(|| format!("Failed to remove {path}"))?;
            self.listeners.notify(path, None);
            return Ok(());
        }

        let text = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO documents (path, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![path, text, now],
            )
            .with_context(|| format!("Failed to write {path}"))?;
        self.listeners.notify(path, Some(value));
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<Subscription> {
        let current = self.read(path)?;
        Ok(self.listeners.register(path, current))
    }

    fn paths(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT path FROM documents ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            paths.push(row?);
        }
        Ok(paths)
    }
}
