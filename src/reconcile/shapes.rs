use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

use crate::domain::memo::Memo;
use crate::domain::priority::Priority;
use crate::domain::timestamp::{from_epoch_millis, parse_human};

/// A timestamp as earlier versions wrote it: epoch milliseconds (sometimes
/// as a float) or text.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StoredInstant {
    Millis(i64),
    Float(f64),
    Text(String),
}

impl StoredInstant {
    pub fn resolve(&self, offset: UtcOffset) -> Option<OffsetDateTime> {
        match self {
            StoredInstant::Millis(millis) => from_epoch_millis(*millis),
            StoredInstant::Float(value) if value.is_finite() => from_epoch_millis(*value as i64),
            StoredInstant::Float(_) => None,
            StoredInstant::Text(text) => match text.trim().parse::<i64>() {
                Ok(millis) => from_epoch_millis(millis),
                Err(_) => parse_human(text, offset),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
enum StoredNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StoredNumber {
    fn as_i64(&self) -> Option<i64> {
        match self {
            StoredNumber::Int(value) => Some(*value),
            StoredNumber::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                Some(*value as i64)
            }
            StoredNumber::Float(_) => None,
            StoredNumber::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Union of every field any generation wrote for a memo.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoRecord {
    #[serde(default)]
    id: Option<StoredNumber>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    created_at: Option<StoredInstant>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    completed_at: Option<StoredInstant>,
    #[serde(default)]
    first_completed_at: Option<StoredInstant>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    folder_name: Option<String>,
    #[serde(default)]
    folder_id: Option<StoredNumber>,
}

/// Fields every generation shares.
#[derive(Debug, Clone, Default)]
pub struct MemoBase {
    id: Option<StoredNumber>,
    content: Option<String>,
    created_at: Option<StoredInstant>,
    completed: Option<bool>,
    completed_at: Option<StoredInstant>,
    first_completed_at: Option<StoredInstant>,
    priority: Option<String>,
}

/// The historical shapes a stored memo can have.
#[derive(Debug, Clone)]
pub enum MemoShape {
    /// Folder referenced by name.
    Current {
        base: MemoBase,
        folder_name: Option<String>,
    },
    /// Folder referenced by the numeric id folders used to carry.
    FolderIdEra {
        base: MemoBase,
        folder_id: Option<i64>,
    },
    /// No folder reference at all.
    Original { base: MemoBase },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    message: String,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized memo record: {}", self.message)
    }
}

impl Error for ShapeError {}

impl MemoShape {
    pub fn classify(value: Value) -> Result<MemoShape, ShapeError> {
        let Value::Object(object) = &value else {
            return Err(ShapeError {
                message: format!("expected an object, found {}", json_kind(&value)),
            });
        };
        let has_folder_name = object.contains_key("folderName");
        let has_folder_id = object.contains_key("folderId");
        let record: MemoRecord = serde_json::from_value(value).map_err(|err| ShapeError {
            message: err.to_string(),
        })?;
        let base = MemoBase {
            id: record.id,
            content: record.content,
            created_at: record.created_at,
            completed: record.completed,
            completed_at: record.completed_at,
            first_completed_at: record.first_completed_at,
            priority: record.priority,
        };

        Ok(if has_folder_name {
            MemoShape::Current {
                base,
                folder_name: record.folder_name,
            }
        } else if has_folder_id {
            MemoShape::FolderIdEra {
                base,
                folder_id: record.folder_id.as_ref().and_then(StoredNumber::as_i64),
            }
        } else {
            MemoShape::Original { base }
        })
    }

    pub fn normalize(self, ctx: &DecodeContext<'_>) -> NormalizedMemo {
        match self {
            MemoShape::Current { base, folder_name } => {
                let folder = folder_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty());
                let defaulted_folder = folder.is_none();
                let folder = folder.unwrap_or_else(|| ctx.default_folder.to_string());
                base.into_memo(folder, defaulted_folder, ctx)
            }
            MemoShape::FolderIdEra { base, folder_id } => {
                let resolved = folder_id.and_then(|id| ctx.legacy_folder_ids.get(&id).cloned());
                let defaulted_folder = resolved.is_none();
                let folder = resolved.unwrap_or_else(|| ctx.default_folder.to_string());
                base.into_memo(folder, defaulted_folder, ctx)
            }
            MemoShape::Original { base } => {
                base.into_memo(ctx.default_folder.to_string(), true, ctx)
            }
        }
    }
}

pub struct DecodeContext<'a> {
    pub default_folder: &'a str,
    pub legacy_folder_ids: HashMap<i64, String>,
    pub offset: UtcOffset,
    pub loaded_at: OffsetDateTime,
}

/// A decoded memo plus what had to be filled in. `memo.id` is 0 when the
/// stored id was missing or unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMemo {
    pub memo: Memo,
    pub defaulted_folder: bool,
    pub defaulted_priority: bool,
    pub defaulted_created_at: bool,
    pub backfilled_first_completed: bool,
}

impl MemoBase {
    fn into_memo(
        self,
        folder_name: String,
        defaulted_folder: bool,
        ctx: &DecodeContext<'_>,
    ) -> NormalizedMemo {
        let id = self
            .id
            .as_ref()
            .and_then(StoredNumber::as_i64)
            .filter(|id| *id > 0)
            .map(|id| id as u64)
            .unwrap_or(0);
        let created_at = self
            .created_at
            .as_ref()
            .and_then(|value| value.resolve(ctx.offset));
        let completed_at = self
            .completed_at
            .as_ref()
            .and_then(|value| value.resolve(ctx.offset));
        let first_completed_at = self
            .first_completed_at
            .as_ref()
            .and_then(|value| value.resolve(ctx.offset));
        let priority = self
            .priority
            .as_deref()
            .and_then(|raw| raw.parse::<Priority>().ok());

        NormalizedMemo {
            memo: Memo {
                id,
                content: self.content.unwrap_or_default(),
                created_at: created_at.unwrap_or(ctx.loaded_at),
                completed: self.completed.unwrap_or(false),
                completed_at,
                first_completed_at: first_completed_at.or(completed_at),
                folder_name,
                priority: priority.unwrap_or_default(),
            },
            defaulted_folder,
            defaulted_priority: priority.is_none(),
            defaulted_created_at: created_at.is_none(),
            backfilled_first_completed: first_completed_at.is_none() && completed_at.is_some(),
        }
    }
}

/// A stored folder: a bare name from the earliest data, or a record that may
/// miss its order and may still carry the numeric id memos once pointed at.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StoredFolder {
    Name(String),
    Record {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        order: Option<StoredNumber>,
        #[serde(default)]
        id: Option<StoredNumber>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFolder {
    pub name: String,
    /// Zero when the stored order was missing or unreadable.
    pub order: i64,
    pub legacy_id: Option<i64>,
}

pub fn decode_folder(value: Value) -> Option<DecodedFolder> {
    let folder: StoredFolder = serde_json::from_value(value).ok()?;
    let (name, order, legacy_id) = match folder {
        StoredFolder::Name(name) => (name, 0, None),
        StoredFolder::Record { name, order, id } => (
            name?,
            order.as_ref().and_then(StoredNumber::as_i64).unwrap_or(0),
            id.as_ref().and_then(StoredNumber::as_i64),
        ),
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(DecodedFolder {
        name,
        order,
        legacy_id,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
