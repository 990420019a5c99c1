use std::collections::HashSet;

use time::OffsetDateTime;

use super::priority::Priority;

pub const DEFAULT_FOLDER_NAME: &str = "默认";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo {
    pub id: u64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub completed: bool,
    pub completed_at: Option<OffsetDateTime>,
    pub first_completed_at: Option<OffsetDateTime>,
    pub folder_name: String,
    pub priority: Priority,
}

impl Memo {
    pub fn new(id: u64, content: &str, folder_name: &str, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            content: content.to_string(),
            created_at,
            completed: false,
            completed_at: None,
            first_completed_at: None,
            folder_name: folder_name.to_string(),
            priority: Priority::default(),
        }
    }

    /// `completed_at` follows the latest transition; `first_completed_at` is
    /// written once and survives un-completing.
    pub fn set_completed(&mut self, completed: bool, at: OffsetDateTime) {
        self.completed = completed;
        if completed {
            if self.first_completed_at.is_none() {
                self.first_completed_at = Some(at);
            }
            self.completed_at = Some(at);
        } else {
            self.completed_at = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    /// Display order. Zero marks a folder whose order was never assigned.
    pub order: i64,
}

impl Folder {
    pub fn new(name: &str, order: i64) -> Self {
        Self {
            name: name.to_string(),
            order,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoCollection {
    pub memos: Vec<Memo>,
    pub folders: Vec<Folder>,
    pub current_folder: Option<String>,
}

impl MemoCollection {
    #[cfg(test)]
    pub fn with_default_folder(name: &str) -> Self {
        Self {
            memos: Vec::new(),
            folders: vec![Folder::new(name, 1)],
            current_folder: Some(name.to_string()),
        }
    }

    pub fn find_memo(&self, id: u64) -> Option<&Memo> {
        self.memos.iter().find(|memo| memo.id == id)
    }

    pub fn find_memo_mut(&mut self, id: u64) -> Option<&mut Memo> {
        self.memos.iter_mut().find(|memo| memo.id == id)
    }

    pub fn has_folder(&self, name: &str) -> bool {
        self.folders.iter().any(|folder| folder.name == name)
    }

    pub fn used_ids(&self) -> HashSet<u64> {
        self.memos.iter().map(|memo| memo.id).collect()
    }

    pub fn next_memo_id(&self) -> u64 {
        lowest_unused_id(&self.used_ids())
    }

    pub fn next_folder_order(&self) -> i64 {
        next_folder_order(&self.folders)
    }

    pub fn current_folder(&self) -> Option<&Folder> {
        let name = self.current_folder.as_deref()?;
        self.folders.iter().find(|folder| folder.name == name)
    }

    /// Keeps the selection when it still names a folder, otherwise falls back
    /// to the first folder (or none). Returns true when the selection moved.
    pub fn revalidate_current_folder(&mut self) -> bool {
        if self.current_folder().is_some() {
            return false;
        }
        let fallback = self.folders.first().map(|folder| folder.name.clone());
        let changed = fallback != self.current_folder;
        self.current_folder = fallback;
        changed
    }
}

/// Lowest positive integer not present in `used`.
pub fn lowest_unused_id(used: &HashSet<u64>) -> u64 {
    let mut id = 1;
    while used.contains(&id) {
        id += 1;
    }
    id
}

pub fn next_folder_order(folders: &[Folder]) -> i64 {
    folders
        .iter()
        .map(|folder| folder.order)
        .max()
        .unwrap_or(0)
        .max(0)
        + 1
}

#[cfg(test)]
mod tests {
    use super::{lowest_unused_id, Folder, Memo, MemoCollection, DEFAULT_FOLDER_NAME};
    use std::collections::HashSet;
    use time::macros::datetime;

    #[test]
    fn completing_sets_both_timestamps_once() {
        let mut memo = Memo::new(
            1,
            "water plants",
            DEFAULT_FOLDER_NAME,
            datetime!(2025-01-01 0:00 UTC),
        );
        let first = datetime!(2025-01-02 9:00 UTC);
        let second = datetime!(2025-01-05 9:00 UTC);

        memo.set_completed(true, first);
        assert_eq!(memo.completed_at, Some(first));
        assert_eq!(memo.first_completed_at, Some(first));

        memo.set_completed(false, second);
        assert!(!memo.completed);
        assert_eq!(memo.completed_at, None);
        assert_eq!(memo.first_completed_at, Some(first));

        memo.set_completed(true, second);
        assert_eq!(memo.completed_at, Some(second));
        assert_eq!(memo.first_completed_at, Some(first));
    }

    #[test]
    fn lowest_unused_id_fills_gaps() {
        let used: HashSet<u64> = [1, 2, 4].into_iter().collect();
        assert_eq!(lowest_unused_id(&used), 3);
        assert_eq!(lowest_unused_id(&HashSet::new()), 1);
    }

    #[test]
    fn revalidate_falls_back_to_first_folder_or_none() {
        let mut collection = MemoCollection {
            memos: Vec::new(),
            folders: vec![Folder::new("work", 2), Folder::new("home", 3)],
            current_folder: Some("gone".to_string()),
        };
        assert!(collection.revalidate_current_folder());
        assert_eq!(collection.current_folder.as_deref(), Some("work"));
        assert!(!collection.revalidate_current_folder());

        collection.folders.clear();
        assert!(collection.revalidate_current_folder());
        assert_eq!(collection.current_folder, None);
    }

    #[test]
    fn next_folder_order_is_highest_plus_one() {
        let collection = MemoCollection {
            memos: Vec::new(),
            folders: vec![
                Folder::new("a", 4),
                Folder::new("b", 0),
                Folder::new("c", 9),
            ],
            current_folder: None,
        };
        assert_eq!(collection.next_folder_order(), 10);
        assert_eq!(MemoCollection::default().next_folder_order(), 1);
    }
}
