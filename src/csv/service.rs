use std::collections::HashSet;

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::domain::memo::{lowest_unused_id, MemoCollection};
use crate::prompt::Prompt;
use crate::reconcile::reconcile;

use super::codec::{parse_records, ParsedRecords};
use super::source::{parse_row, Columns, IncomingMemo, RowDefaults};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    Reassign,
    Overwrite,
    Skip,
}

impl CollisionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            CollisionPolicy::Reassign => "reassign",
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub status: String,
    pub processed_count: u64,
    pub dropped_count: u64,
    pub inserted_count: u64,
    pub overwritten_count: u64,
    pub reassigned_count: u64,
    pub skipped_count: u64,
    pub collision_count: u64,
    pub policy: Option<CollisionPolicy>,
    pub synthesized_folders: Vec<String>,
    pub last_error: Option<String>,
}

impl ImportSummary {
    fn new() -> Self {
        Self {
            status: "empty".to_string(),
            processed_count: 0,
            dropped_count: 0,
            inserted_count: 0,
            overwritten_count: 0,
            reassigned_count: 0,
            skipped_count: 0,
            collision_count: 0,
            policy: None,
            synthesized_folders: Vec::new(),
            last_error: None,
        }
    }

    /// True when the collection was touched and needs saving.
    pub fn changed(&self) -> bool {
        self.inserted_count > 0 || self.overwritten_count > 0
    }
}

pub const REASSIGN_QUESTION: &str =
    "Assign new ids to the imported duplicates and keep the existing memos?";
pub const OVERWRITE_QUESTION: &str =
    "Overwrite the existing memos with the imported ones? Declining skips the duplicates.";

/// Merges CSV text into a live collection, asking the user how to resolve id
/// collisions.
pub struct ImportService<'a> {
    collection: &'a mut MemoCollection,
    prompt: &'a mut dyn Prompt,
    default_folder: &'a str,
    now: OffsetDateTime,
    offset: UtcOffset,
}

impl<'a> ImportService<'a> {
    pub fn new(
        collection: &'a mut MemoCollection,
        prompt: &'a mut dyn Prompt,
        default_folder: &'a str,
        now: OffsetDateTime,
        offset: UtcOffset,
    ) -> Self {
        Self {
            collection,
            prompt,
            default_folder,
            now,
            offset,
        }
    }

    pub fn import_text(&mut self, text: &str) -> ImportSummary {
        let mut summary = ImportSummary::new();
        let ParsedRecords {
            records,
            unterminated,
        } = parse_records(text);
        // The open record follows every complete one.
        let open_record = unterminated.map(|err| format!("record {}: {}", records.len() + 1, err));
        let Some((header, rows)) = records.split_first() else {
            if let Some(message) = open_record {
                drop_record(&mut summary, message);
            }
            summary.status = summary_status(&summary).to_string();
            return summary;
        };

        let columns = Columns::resolve(header);
        let folder_name = self
            .collection
            .current_folder
            .clone()
            .unwrap_or_else(|| self.default_folder.to_string());
        let defaults = RowDefaults {
            folder_name: &folder_name,
            now: self.now,
            offset: self.offset,
        };

        let mut incoming = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match parse_row(row, &columns, &defaults) {
                Ok(memo) => {
                    summary.processed_count += 1;
                    incoming.push(memo);
                }
                Err(err) => {
                    // Header is record 1.
                    drop_record(&mut summary, format!("record {}: {}", index + 2, err));
                }
            }
        }
        if let Some(message) = open_record {
            drop_record(&mut summary, message);
        }

        if !incoming.is_empty() {
            let incoming = self.resolve_collisions(incoming, &mut summary);
            self.insert(incoming, &mut summary);
            summary.synthesized_folders = reconcile(self.collection).synthesized_folders;
        }

        summary.status = summary_status(&summary).to_string();
        summary
    }

    /// Applies the chosen policy and returns the rows still to be inserted.
    fn resolve_collisions(
        &mut self,
        mut incoming: Vec<IncomingMemo>,
        summary: &mut ImportSummary,
    ) -> Vec<IncomingMemo> {
        let existing = self.collection.used_ids();
        let collides = |memo: &IncomingMemo| {
            memo.requested_id
                .is_some_and(|id| existing.contains(&id))
        };
        summary.collision_count = incoming.iter().filter(|memo| collides(memo)).count() as u64;
        if summary.collision_count == 0 {
            return incoming;
        }

        let policy = if self.prompt.confirm(&format!(
            "{} imported memo(s) share an id with existing memos. {}",
            summary.collision_count, REASSIGN_QUESTION
        )) {
            CollisionPolicy::Reassign
        } else if self.prompt.confirm(OVERWRITE_QUESTION) {
            CollisionPolicy::Overwrite
        } else {
            CollisionPolicy::Skip
        };
        summary.policy = Some(policy);
        tracing::debug!(policy = policy.as_str(), "resolving csv id collisions");

        match policy {
            CollisionPolicy::Reassign => {
                for memo in incoming.iter_mut().filter(|memo| collides(memo)) {
                    memo.requested_id = None;
                }
                incoming
            }
            CollisionPolicy::Overwrite => {
                let mut remaining = Vec::with_capacity(incoming.len());
                for memo in incoming {
                    let target = memo.requested_id.filter(|id| existing.contains(id));
                    // The prompt blocked; the target may have gone meanwhile.
                    match target.and_then(|id| self.collection.find_memo_mut(id)) {
                        Some(existing_memo) => {
                            let id = existing_memo.id;
                            *existing_memo = memo.memo;
                            existing_memo.id = id;
                            summary.overwritten_count += 1;
                        }
                        None => remaining.push(memo),
                    }
                }
                remaining
            }
            CollisionPolicy::Skip => {
                let before = incoming.len();
                incoming.retain(|memo| !collides(memo));
                summary.skipped_count = (before - incoming.len()) as u64;
                incoming
            }
        }
    }

    /// Keeps each requested id that is still free; everything else takes the
    /// lowest unused id.
    fn insert(&mut self, incoming: Vec<IncomingMemo>, summary: &mut ImportSummary) {
        let mut used: HashSet<u64> = self.collection.used_ids();
        for IncomingMemo {
            requested_id,
            mut memo,
        } in incoming
        {
            let id = match requested_id {
                Some(id) if !used.contains(&id) => id,
                _ => {
                    summary.reassigned_count += 1;
                    lowest_unused_id(&used)
                }
            };
            used.insert(id);
            memo.id = id;
            self.collection.memos.push(memo);
            summary.inserted_count += 1;
        }
    }
}

fn drop_record(summary: &mut ImportSummary, message: String) {
    tracing::debug!(error = %message, "dropping csv record");
    summary.processed_count += 1;
    summary.dropped_count += 1;
    summary.last_error = Some(message);
}

fn summary_status(summary: &ImportSummary) -> &'static str {
    if summary.processed_count == 0 {
        "empty"
    } else if summary.dropped_count > 0 {
        "partial"
    } else {
        "completed"
    }
}
