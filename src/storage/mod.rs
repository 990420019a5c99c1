mod chunks;
pub mod documents;
mod store;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

pub use chunks::encoded_len;
pub use documents::{AggregateDocument, FolderSave, IndexDocument, MemoSave, RawAggregate};
pub use store::{DocumentStore, StoreError, StoredDocument};

pub const PRIMARY_KEY: &str = "memos";
pub const CHUNK_KEY_PREFIX: &str = "memos_chunk_";
pub const INDEX_KEY: &str = "memos_index";
pub const DEFAULT_CHUNK_CEILING_BYTES: usize = 950 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Single,
    Chunked,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Single => "single",
            StorageMode::Chunked => "chunked",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAggregate {
    pub raw: RawAggregate,
    pub mode: StorageMode,
    pub skipped_chunks: Vec<String>,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub mode: StorageMode,
    pub chunk_count: usize,
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

impl SaveReport {
    fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            chunk_count: 0,
            written: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the document store handle, the last known revision of every key it
/// has touched, and the single/chunked layout decision.
pub struct Storage<S> {
    store: S,
    revisions: HashMap<String, String>,
    ceiling: usize,
    chunked: Option<bool>,
}

impl<S: DocumentStore> Storage<S> {
    pub fn new(store: S, ceiling: usize) -> Self {
        Self {
            store,
            revisions: HashMap::new(),
            ceiling,
            chunked: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn known_revision(&self, key: &str) -> Option<&str> {
        self.revisions.get(key).map(String::as_str)
    }

    /// Reads a document and remembers its revision. Store failures read as
    /// absent.
    pub fn read(&mut self, key: &str) -> Option<Value> {
        match self.store.get(key) {
            Ok(Some(doc)) => {
                self.revisions.insert(key.to_string(), doc.rev);
                Some(doc.body)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "document read failed");
                None
            }
        }
    }

    /// Writes a document presenting the latest known revision. The revision
    /// of a key never seen before is probed first. A failed write leaves the
    /// known revision untouched.
    pub fn write(&mut self, key: &str, body: &Value) -> Result<String, StoreError> {
        if !self.revisions.contains_key(key) {
            if let Some(existing) = self.store.get(key)? {
                self.revisions.insert(key.to_string(), existing.rev);
            }
        }
        let rev = self.store.put(key, body, self.known_revision(key))?;
        self.revisions.insert(key.to_string(), rev.clone());
        Ok(rev)
    }

    pub fn load_aggregate(&mut self, default_folder: &str) -> LoadedAggregate {
        if let Some(value) = self.read(INDEX_KEY) {
            match serde_json::from_value::<IndexDocument>(value) {
                Ok(index) => {
                    self.chunked = Some(true);
                    return self.load_chunks(&index.ids);
                }
                Err(err) => {
                    tracing::warn!(key = INDEX_KEY, error = %err, "unreadable chunk index");
                }
            }
        }
        self.chunked = Some(false);

        if let Some(value) = self.read(PRIMARY_KEY) {
            let raw = serde_json::from_value::<RawAggregate>(value).unwrap_or_else(|err| {
                tracing::warn!(key = PRIMARY_KEY, error = %err, "unreadable memo document");
                RawAggregate::default()
            });
            return LoadedAggregate {
                raw,
                mode: StorageMode::Single,
                skipped_chunks: Vec::new(),
                initialized: false,
            };
        }

        let folder = FolderSave {
            name: default_folder.to_string(),
            order: 1,
        };
        let folders = [folder.clone()];
        let report = self.save_aggregate(AggregateDocument {
            memos: &[],
            current_folder: Some(&folder),
            folders: &folders,
        });
        tracing::debug!(written = report.written.len(), "initialized empty memo store");

        let folder_value = json!({ "name": folder.name, "order": folder.order });
        LoadedAggregate {
            raw: RawAggregate {
                memos: Vec::new(),
                current_folder: Some(folder_value.clone()),
                folders: vec![folder_value],
            },
            mode: report.mode,
            skipped_chunks: Vec::new(),
            initialized: true,
        }
    }

    fn load_chunks(&mut self, keys: &[String]) -> LoadedAggregate {
        let mut raw = RawAggregate::default();
        let mut skipped_chunks = Vec::new();
        for (position, key) in keys.iter().enumerate() {
            let Some(value) = self.read(key) else {
                tracing::warn!(key = %key, "chunk listed in index is missing; skipping");
                skipped_chunks.push(key.clone());
                continue;
            };
            let chunk = match serde_json::from_value::<RawAggregate>(value) {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "unreadable chunk; skipping");
                    skipped_chunks.push(key.clone());
                    continue;
                }
            };
            raw.memos.extend(chunk.memos);
            if position == 0 {
                raw.folders = chunk.folders;
                raw.current_folder = chunk.current_folder;
            }
        }
        LoadedAggregate {
            raw,
            mode: StorageMode::Chunked,
            skipped_chunks,
            initialized: false,
        }
    }

    pub fn save_aggregate(&mut self, doc: AggregateDocument<'_>) -> SaveReport {
        if !self.is_chunked() {
            match serde_json::to_value(doc) {
                Ok(body) => match encoded_len(&body) {
                    Ok(size) if size <= self.ceiling => {
                        let mut report = SaveReport::new(StorageMode::Single);
                        report.chunk_count = 1;
                        self.write_logged(PRIMARY_KEY, &body, &mut report);
                        return report;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "could not measure memo document");
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "could not encode memo document");
                    let mut report = SaveReport::new(StorageMode::Single);
                    report.failed.push(PRIMARY_KEY.to_string());
                    return report;
                }
            }
        }
        self.save_chunks(doc)
    }

    fn save_chunks(&mut self, doc: AggregateDocument<'_>) -> SaveReport {
        let mut report = SaveReport::new(StorageMode::Chunked);
        let ranges = match chunks::partition(doc, self.ceiling) {
            Ok(ranges) => ranges,
            Err(err) => {
                tracing::warn!(error = %err, "could not partition memo collection");
                report.failed.push(INDEX_KEY.to_string());
                return report;
            }
        };

        let mut index = IndexDocument::default();
        for (position, range) in ranges.into_iter().enumerate() {
            let key = chunk_key(position + 1);
            let chunk = doc.chunk(&doc.memos[range], position == 0);
            match serde_json::to_value(chunk) {
                Ok(body) => {
                    self.write_logged(&key, &body, &mut report);
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "could not encode chunk");
                    report.failed.push(key.clone());
                }
            }
            index.ids.push(key);
        }
        report.chunk_count = index.ids.len();

        match serde_json::to_value(&index) {
            Ok(body) => {
                if self.write_logged(INDEX_KEY, &body, &mut report) {
                    self.chunked = Some(true);
                }
            }
            Err(err) => {
                tracing::warn!(key = INDEX_KEY, error = %err, "could not encode chunk index");
                report.failed.push(INDEX_KEY.to_string());
            }
        }
        report
    }

    fn is_chunked(&mut self) -> bool {
        if let Some(chunked) = self.chunked {
            return chunked;
        }
        let chunked = self.read(INDEX_KEY).is_some();
        self.chunked = Some(chunked);
        chunked
    }

    fn write_logged(&mut self, key: &str, body: &Value, report: &mut SaveReport) -> bool {
        match self.write(key, body) {
            Ok(_) => {
                report.written.push(key.to_string());
                true
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "document write failed");
                report.failed.push(key.to_string());
                false
            }
        }
    }
}

pub fn chunk_key(position: usize) -> String {
    format!("{CHUNK_KEY_PREFIX}{position}")
}
