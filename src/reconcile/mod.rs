mod shapes;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};

use crate::domain::memo::{lowest_unused_id, next_folder_order, Folder, MemoCollection};
use crate::storage::RawAggregate;

use shapes::{decode_folder, DecodeContext, MemoShape};

/// What loading and repairing a collection had to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub skipped_records: usize,
    pub skipped_folders: usize,
    pub defaulted_folders: usize,
    pub defaulted_priorities: usize,
    pub defaulted_created_at: usize,
    pub backfilled_first_completed: usize,
    pub merged_folders: Vec<String>,
    pub synthesized_folders: Vec<String>,
    pub reordered_folders: Vec<String>,
    pub reassigned_ids: Vec<ReassignedId>,
    pub current_folder_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassignedId {
    pub from: u64,
    pub to: u64,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

/// Decodes every stored record into the current in-memory shape and repairs
/// the result.
pub fn load_collection(
    raw: RawAggregate,
    default_folder: &str,
    offset: UtcOffset,
    loaded_at: OffsetDateTime,
) -> (MemoCollection, ReconcileReport) {
    let mut report = ReconcileReport::default();
    let mut collection = MemoCollection::default();

    let mut legacy_folder_ids = HashMap::new();
    for value in raw.folders {
        match decode_folder(value) {
            Some(decoded) => {
                if let Some(id) = decoded.legacy_id {
                    legacy_folder_ids.entry(id).or_insert(decoded.name.clone());
                }
                collection
                    .folders
                    .push(Folder::new(&decoded.name, decoded.order));
            }
            None => {
                tracing::warn!("skipping folder record without a usable name");
                report.skipped_folders += 1;
            }
        }
    }

    let ctx = DecodeContext {
        default_folder,
        legacy_folder_ids,
        offset,
        loaded_at,
    };
    for (position, value) in raw.memos.into_iter().enumerate() {
        let shape = match MemoShape::classify(value) {
            Ok(shape) => shape,
            Err(err) => {
                tracing::warn!(position, error = %err, "skipping stored memo");
                report.skipped_records += 1;
                continue;
            }
        };
        let normalized = shape.normalize(&ctx);
        if normalized.defaulted_created_at {
            tracing::warn!(
                id = normalized.memo.id,
                "memo has no readable createdAt; using load time"
            );
            report.defaulted_created_at += 1;
        }
        report.defaulted_folders += usize::from(normalized.defaulted_folder);
        report.defaulted_priorities += usize::from(normalized.defaulted_priority);
        report.backfilled_first_completed += usize::from(normalized.backfilled_first_completed);
        collection.memos.push(normalized.memo);
    }

    collection.current_folder = raw
        .current_folder
        .and_then(decode_folder)
        .map(|folder| folder.name);

    repair(&mut collection, &mut report);
    if !report.is_noop() {
        tracing::debug!(?report, "reconciled stored memo collection");
    }
    (collection, report)
}

/// Repairs an in-memory collection so every invariant holds. Running it on
/// an already repaired collection changes nothing.
pub fn reconcile(collection: &mut MemoCollection) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    repair(collection, &mut report);
    report
}

fn repair(collection: &mut MemoCollection, report: &mut ReconcileReport) {
    merge_duplicate_folders(collection, report);
    reassign_ids(collection, report);
    synthesize_missing_folders(collection, report);
    assign_missing_orders(collection, report);
    report.current_folder_changed = collection.revalidate_current_folder();
}

fn merge_duplicate_folders(collection: &mut MemoCollection, report: &mut ReconcileReport) {
    let mut seen = HashSet::new();
    collection.folders.retain(|folder| {
        if seen.insert(folder.name.clone()) {
            return true;
        }
        tracing::debug!(folder = %folder.name, "dropping duplicate folder");
        report.merged_folders.push(folder.name.clone());
        false
    });
}

/// The first memo holding a positive id keeps it. Later duplicates and
/// unassigned ids take the lowest unused id.
fn reassign_ids(collection: &mut MemoCollection, report: &mut ReconcileReport) {
    let mut used = HashSet::new();
    let mut needs_id = Vec::new();
    for (position, memo) in collection.memos.iter().enumerate() {
        if memo.id == 0 || !used.insert(memo.id) {
            needs_id.push(position);
        }
    }

    for position in needs_id {
        let id = lowest_unused_id(&used);
        used.insert(id);
        let memo = &mut collection.memos[position];
        tracing::debug!(from = memo.id, to = id, "reassigning memo id");
        report.reassigned_ids.push(ReassignedId {
            from: memo.id,
            to: id,
        });
        memo.id = id;
    }
}

fn synthesize_missing_folders(collection: &mut MemoCollection, report: &mut ReconcileReport) {
    for position in 0..collection.memos.len() {
        let name = &collection.memos[position].folder_name;
        if collection.has_folder(name) {
            continue;
        }
        let folder = Folder::new(name, next_folder_order(&collection.folders));
        tracing::debug!(folder = %folder.name, order = folder.order, "synthesizing folder");
        report.synthesized_folders.push(folder.name.clone());
        collection.folders.push(folder);
    }
}

fn assign_missing_orders(collection: &mut MemoCollection, report: &mut ReconcileReport) {
    for position in 0..collection.folders.len() {
        if collection.folders[position].order > 0 {
            continue;
        }
        let order = next_folder_order(&collection.folders);
        let folder = &mut collection.folders[position];
        folder.order = order;
        report.reordered_folders.push(folder.name.clone());
    }
}
