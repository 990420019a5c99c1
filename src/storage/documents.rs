use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::memo::{Folder, Memo};
use crate::domain::timestamp::to_epoch_millis;

/// Stored form of a memo. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoSave {
    pub id: u64,
    pub content: String,
    pub created_at: i64,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub folder_name: String,
    pub priority: String,
    pub first_completed_at: Option<i64>,
}

impl From<&Memo> for MemoSave {
    fn from(value: &Memo) -> Self {
        Self {
            id: value.id,
            content: value.content.clone(),
            created_at: to_epoch_millis(value.created_at),
            completed: value.completed,
            completed_at: value.completed_at.map(to_epoch_millis),
            folder_name: value.folder_name.clone(),
            priority: value.priority.as_str().to_string(),
            first_completed_at: value.first_completed_at.map(to_epoch_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderSave {
    pub name: String,
    pub order: i64,
}

impl From<&Folder> for FolderSave {
    fn from(value: &Folder) -> Self {
        Self {
            name: value.name.clone(),
            order: value.order,
        }
    }
}

/// Shape shared by the primary document and every chunk. Only the first
/// chunk carries folders and the current folder.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDocument<'a> {
    pub memos: &'a [MemoSave],
    pub current_folder: Option<&'a FolderSave>,
    pub folders: &'a [FolderSave],
}

impl<'a> AggregateDocument<'a> {
    pub fn chunk(self, memos: &'a [MemoSave], first: bool) -> AggregateDocument<'a> {
        if first {
            AggregateDocument { memos, ..self }
        } else {
            AggregateDocument {
                memos,
                current_folder: None,
                folders: &[],
            }
        }
    }
}

/// What was read back from the store before any normalization. Entries stay
/// untyped because several historical shapes coexist.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAggregate {
    #[serde(default)]
    pub memos: Vec<Value>,
    #[serde(default)]
    pub current_folder: Option<Value>,
    #[serde(default)]
    pub folders: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDocument {
    pub ids: Vec<String>,
}
