use std::error::Error;
use std::fmt;

use serde_json::Value;

/// One stored document as returned by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub rev: String,
    pub body: Value,
}

/// Key/value document store with optimistic revisions.
///
/// `put` must be given the revision returned by the previous successful write
/// of the same key (or `None` when the key has never been written) and
/// returns the new revision.
pub trait DocumentStore {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError>;
    fn put(&self, key: &str, body: &Value, rev: Option<&str>) -> Result<String, StoreError>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &Value, rev: Option<&str>) -> Result<String, StoreError> {
        (**self).put(key, body, rev)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Db(rusqlite::Error),
    Json(serde_json::Error),
    Conflict {
        key: String,
        presented: Option<String>,
    },
    TooLarge {
        key: String,
        size: usize,
        limit: usize,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Db(err) => write!(f, "database error: {}", err),
            StoreError::Json(err) => write!(f, "JSON error: {}", err),
            StoreError::Conflict { key, presented } => write!(
                f,
                "revision conflict on '{}' (presented {})",
                key,
                presented.as_deref().unwrap_or("none")
            ),
            StoreError::TooLarge { key, size, limit } => write!(
                f,
                "document '{}' is {} bytes, above the {} byte limit",
                key, size, limit
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Db(err) => Some(err),
            StoreError::Json(err) => Some(err),
            StoreError::Conflict { .. } | StoreError::TooLarge { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Db(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Json(value)
    }
}
