use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::storage::{DocumentStore, StoreError, StoredDocument};

pub const CURRENT_SCHEMA_VERSION: i64 = 1;
pub const DEFAULT_STORE_LIMIT_BYTES: usize = 1024 * 1024;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 1] = [Migration {
    version: 1,
    name: "document_store_v1",
    sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    key TEXT PRIMARY KEY,
    rev TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
}];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// SQLite-backed [`DocumentStore`]. Every document is one JSON text row with
/// a `<generation>-<digest>` revision; bodies above `limit_bytes` are refused.
pub struct SqliteStore {
    conn: Connection,
    limit_bytes: usize,
}

impl SqliteStore {
    pub fn open(path: &str, limit_bytes: usize) -> Result<Self> {
        Ok(Self::from_connection(open_connection(path)?, limit_bytes))
    }

    pub fn from_connection(conn: Connection, limit_bytes: usize) -> Self {
        Self { conn, limit_bytes }
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM documents ORDER BY key")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }

    fn current_rev(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT rev FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT rev, body FROM documents WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((rev, body)) => Ok(Some(StoredDocument {
                key: key.to_string(),
                rev,
                body: serde_json::from_str(&body)?,
            })),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, body: &Value, rev: Option<&str>) -> Result<String, StoreError> {
        let text = serde_json::to_string(body)?;
        if text.len() > self.limit_bytes {
            return Err(StoreError::TooLarge {
                key: key.to_string(),
                size: text.len(),
                limit: self.limit_bytes,
            });
        }

        let generation = match (self.current_rev(key)?, rev) {
            (None, None) => 1,
            (Some(current), Some(presented)) if current == presented => {
                revision_generation(&current) + 1
            }
            _ => {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    presented: rev.map(str::to_string),
                });
            }
        };

        let next_rev = format!("{}-{}", generation, digest(&text));
        self.conn.execute(
            r#"
INSERT INTO documents (key, rev, body, updated_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(key) DO UPDATE SET
    rev = excluded.rev,
    body = excluded.body,
    updated_at = excluded.updated_at
"#,
            params![key, next_rev, text, now_utc_rfc3339()],
        )?;
        Ok(next_rev)
    }
}

fn revision_generation(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        use std::fmt::Write as _;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
