use std::error::Error;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use time::{Date, UtcOffset};

use crate::config::{
    self, DateFilter, ParseChoiceError, PriorityFilter, SortKey, StatusFilter, ViewConfig,
};
use crate::csv::{export_memos, read_source, CsvError, ImportService, ImportSummary};
use crate::db::SqliteStore;
use crate::domain::memo::{Folder, Memo, MemoCollection};
use crate::domain::priority::{ParsePriorityError, Priority};
use crate::domain::timestamp::{format_day, format_human, local_offset, now_millis};
use crate::prompt::Prompt;
use crate::reconcile::{load_collection, ReconcileReport};
use crate::settings::{Settings, SettingsError};
use crate::storage::{AggregateDocument, FolderSave, MemoSave, SaveReport, Storage, StorageMode};
use crate::view::project;

pub struct App {
    storage: Storage<SqliteStore>,
    collection: MemoCollection,
    config: ViewConfig,
    settings: Settings,
    offset: UtcOffset,
    mode: StorageMode,
    load_report: ReconcileReport,
    skipped_chunks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MemoView {
    pub id: u64,
    pub content: String,
    pub created_at: String,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub first_completed_at: Option<String>,
    pub folder_name: String,
    pub priority: String,
}

impl MemoView {
    fn from_memo(memo: &Memo, offset: UtcOffset) -> Self {
        Self {
            id: memo.id,
            content: memo.content.clone(),
            created_at: format_human(memo.created_at, offset),
            completed: memo.completed,
            completed_at: memo.completed_at.map(|value| format_human(value, offset)),
            first_completed_at: memo
                .first_completed_at
                .map(|value| format_human(value, offset)),
            folder_name: memo.folder_name.clone(),
            priority: memo.priority.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FolderView {
    pub name: String,
    pub order: i64,
    pub memo_count: usize,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigView {
    pub sort_key: String,
    pub sort_direction: String,
    pub fixed_comp_down: bool,
    pub priority_filter: String,
    pub date_filter: String,
    pub status_filter: String,
    pub date_filter_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusView {
    pub storage_mode: StorageMode,
    pub chunk_ceiling_bytes: usize,
    pub store_limit_bytes: usize,
    pub memo_count: usize,
    pub folder_count: usize,
    pub current_folder: Option<String>,
    pub skipped_chunks: Vec<String>,
    pub documents: Vec<String>,
    pub load_repairs: ReconcileReport,
}

impl App {
    pub fn open(db_path: &str, settings: Settings) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let store = SqliteStore::open(db_path, settings.store_limit_bytes)?;
        Ok(Self::load(store, settings, local_offset()))
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory(settings: Settings, offset: UtcOffset) -> Result<Self, AppError> {
        let conn = crate::db::open_in_memory()?;
        let store = SqliteStore::from_connection(conn, settings.store_limit_bytes);
        Ok(Self::load(store, settings, offset))
    }

    fn load(store: SqliteStore, settings: Settings, offset: UtcOffset) -> Self {
        let mut storage = Storage::new(store, settings.chunk_ceiling_bytes);
        let loaded = storage.load_aggregate(&settings.default_folder);
        if loaded.initialized {
            tracing::info!(folder = %settings.default_folder, "started a new memo collection");
        }
        let (collection, load_report) =
            load_collection(loaded.raw, &settings.default_folder, offset, now_millis());
        let config = config::load_config(&mut storage);

        let mut app = Self {
            storage,
            collection,
            config,
            settings,
            offset,
            mode: loaded.mode,
            load_report,
            skipped_chunks: loaded.skipped_chunks,
        };
        if !app.load_report.is_noop() {
            tracing::info!("persisting repaired memo collection");
            app.save_memos();
        }
        app
    }

    pub fn collection(&self) -> &MemoCollection {
        &self.collection
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn status(&self) -> StatusView {
        let documents = self.storage.store().list_keys().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not list stored documents");
            Vec::new()
        });
        StatusView {
            storage_mode: self.mode,
            chunk_ceiling_bytes: self.settings.chunk_ceiling_bytes,
            store_limit_bytes: self.settings.store_limit_bytes,
            memo_count: self.collection.memos.len(),
            folder_count: self.collection.folders.len(),
            current_folder: self.collection.current_folder.clone(),
            skipped_chunks: self.skipped_chunks.clone(),
            documents,
            load_repairs: self.load_report.clone(),
        }
    }

    /// Writes memos, folders and the current folder. Failures are logged and
    /// reported, never raised.
    pub fn save_memos(&mut self) -> SaveReport {
        let memos: Vec<MemoSave> = self.collection.memos.iter().map(MemoSave::from).collect();
        let folders: Vec<FolderSave> = self
            .collection
            .folders
            .iter()
            .map(FolderSave::from)
            .collect();
        let current = self.collection.current_folder().map(FolderSave::from);
        let report = self.storage.save_aggregate(AggregateDocument {
            memos: &memos,
            current_folder: current.as_ref(),
            folders: &folders,
        });
        if !report.ok() {
            tracing::warn!(failed = ?report.failed, "memo collection was only partly saved");
        }
        self.mode = report.mode;
        report
    }

    fn save_config(&mut self) {
        if let Err(err) = config::save_config(&mut self.storage, &self.config) {
            tracing::warn!(error = %err, "config write failed");
        }
    }

    pub fn add_memo(&mut self, content: &str) -> Result<MemoView, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "memo content must not be empty".to_string(),
            ));
        }
        let folder = self
            .collection
            .current_folder()
            .map(|folder| folder.name.clone())
            .ok_or(AppError::NoCurrentFolder)?;
        let memo = Memo::new(
            self.collection.next_memo_id(),
            content,
            &folder,
            now_millis(),
        );
        let view = MemoView::from_memo(&memo, self.offset);
        self.collection.memos.push(memo);
        self.save_memos();
        Ok(view)
    }

    /// Empty content deletes the memo; `None` is returned in that case.
    pub fn update_content(&mut self, id: u64, content: &str) -> Result<Option<MemoView>, AppError> {
        let memo = self
            .collection
            .find_memo_mut(id)
            .ok_or(AppError::NotFound(id))?;
        if content.trim().is_empty() {
            self.collection.memos.retain(|memo| memo.id != id);
            self.save_memos();
            return Ok(None);
        }
        memo.content = content.to_string();
        let view = MemoView::from_memo(memo, self.offset);
        self.save_memos();
        Ok(Some(view))
    }

    pub fn delete_memo(&mut self, id: u64, prompt: &mut dyn Prompt) -> Result<bool, AppError> {
        Ok(self.delete_memos(&[id], prompt)? > 0)
    }

    /// Returns how many memos were removed; zero when the user declined.
    pub fn delete_memos(&mut self, ids: &[u64], prompt: &mut dyn Prompt) -> Result<usize, AppError> {
        self.require_memos(ids)?;
        let question = match ids {
            [id] => format!("Delete memo {}?", id),
            _ => format!("Delete {} memos?", ids.len()),
        };
        if !prompt.confirm(&question) {
            return Ok(0);
        }
        let before = self.collection.memos.len();
        self.collection.memos.retain(|memo| !ids.contains(&memo.id));
        let removed = before - self.collection.memos.len();
        self.save_memos();
        Ok(removed)
    }

    pub fn set_completed(&mut self, id: u64, completed: bool) -> Result<MemoView, AppError> {
        let memo = self
            .collection
            .find_memo_mut(id)
            .ok_or(AppError::NotFound(id))?;
        memo.set_completed(completed, now_millis());
        let view = MemoView::from_memo(memo, self.offset);
        self.save_memos();
        Ok(view)
    }

    pub fn set_priority(&mut self, id: u64, priority: &str) -> Result<MemoView, AppError> {
        let priority: Priority = priority.parse()?;
        let memo = self
            .collection
            .find_memo_mut(id)
            .ok_or(AppError::NotFound(id))?;
        memo.priority = priority;
        let view = MemoView::from_memo(memo, self.offset);
        self.save_memos();
        Ok(view)
    }

    pub fn move_memos(&mut self, ids: &[u64], folder: &str) -> Result<usize, AppError> {
        let folder = folder.trim();
        if !self.collection.has_folder(folder) {
            return Err(AppError::UnknownFolder(folder.to_string()));
        }
        self.require_memos(ids)?;
        let mut moved = 0;
        for memo in self
            .collection
            .memos
            .iter_mut()
            .filter(|memo| ids.contains(&memo.id))
        {
            memo.folder_name = folder.to_string();
            moved += 1;
        }
        self.save_memos();
        Ok(moved)
    }

    pub fn folders(&self) -> Vec<FolderView> {
        let current = self.collection.current_folder.as_deref();
        self.collection
            .folders
            .iter()
            .map(|folder| FolderView {
                name: folder.name.clone(),
                order: folder.order,
                memo_count: self
                    .collection
                    .memos
                    .iter()
                    .filter(|memo| memo.folder_name == folder.name)
                    .count(),
                current: current == Some(folder.name.as_str()),
            })
            .collect()
    }

    /// Creates a folder and selects it. Blank names are ignored and taken
    /// names are refused with a notice; both return `None`.
    pub fn add_folder(
        &mut self,
        name: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<Option<FolderView>, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if self.collection.has_folder(name) {
            prompt.notify(&format!("Folder '{}' already exists.", name));
            return Ok(None);
        }
        let folder = Folder::new(name, self.collection.next_folder_order());
        let view = FolderView {
            name: folder.name.clone(),
            order: folder.order,
            memo_count: 0,
            current: true,
        };
        self.collection.folders.push(folder);
        self.collection.current_folder = Some(name.to_string());
        self.save_memos();
        Ok(Some(view))
    }

    pub fn select_folder(&mut self, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if !self.collection.has_folder(name) {
            return Err(AppError::UnknownFolder(name.to_string()));
        }
        self.collection.current_folder = Some(name.to_string());
        self.save_memos();
        Ok(())
    }

    /// A folder that still holds memos needs a second confirmation, which
    /// deletes them too. Declining either question changes nothing.
    pub fn delete_folder(&mut self, name: &str, prompt: &mut dyn Prompt) -> Result<bool, AppError> {
        let name = name.trim();
        if !self.collection.has_folder(name) {
            return Err(AppError::UnknownFolder(name.to_string()));
        }
        if !prompt.confirm(&format!("Delete folder '{}'?", name)) {
            return Ok(false);
        }
        let held = self
            .collection
            .memos
            .iter()
            .filter(|memo| memo.folder_name == name)
            .count();
        if held > 0
            && !prompt.confirm(&format!(
                "Folder '{}' still holds {} memo(s). Delete them as well?",
                name, held
            ))
        {
            return Ok(false);
        }

        if !self.collection.has_folder(name) {
            return Ok(false);
        }
        self.collection.memos.retain(|memo| memo.folder_name != name);
        self.collection.folders.retain(|folder| folder.name != name);
        self.collection.revalidate_current_folder();
        self.save_memos();
        Ok(true)
    }

    /// Renames the folder and every memo filed under it. Refused with a
    /// notice when the new name is taken.
    pub fn rename_folder(
        &mut self,
        old: &str,
        new: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<bool, AppError> {
        let old = old.trim();
        let new = new.trim();
        if new.is_empty() {
            return Err(AppError::InvalidArgument(
                "folder name must not be empty".to_string(),
            ));
        }
        if !self.collection.has_folder(old) {
            return Err(AppError::UnknownFolder(old.to_string()));
        }
        if old == new {
            return Ok(false);
        }
        if self.collection.has_folder(new) {
            prompt.notify(&format!("Folder '{}' already exists.", new));
            return Ok(false);
        }

        for folder in self
            .collection
            .folders
            .iter_mut()
            .filter(|folder| folder.name == old)
        {
            folder.name = new.to_string();
        }
        for memo in self
            .collection
            .memos
            .iter_mut()
            .filter(|memo| memo.folder_name == old)
        {
            memo.folder_name = new.to_string();
        }
        if self.collection.current_folder.as_deref() == Some(old) {
            self.collection.current_folder = Some(new.to_string());
        }
        self.save_memos();
        Ok(true)
    }

    pub fn set_sort_by(&mut self, key: &str) -> Result<ConfigView, AppError> {
        let key: SortKey = key.parse()?;
        self.config.set_sort_by(key);
        self.save_config();
        Ok(self.config_view())
    }

    pub fn set_fixed_comp_down(&mut self, enabled: bool) -> ConfigView {
        self.config.fixed_comp_down = enabled;
        self.save_config();
        self.config_view()
    }

    pub fn set_priority_filter(&mut self, filter: &str) -> Result<ConfigView, AppError> {
        self.config.priority_filter = filter.parse::<PriorityFilter>()?;
        self.save_config();
        Ok(self.config_view())
    }

    pub fn set_status_filter(&mut self, filter: &str) -> Result<ConfigView, AppError> {
        self.config.status_filter = filter.parse::<StatusFilter>()?;
        self.save_config();
        Ok(self.config_view())
    }

    pub fn set_date_filter(&mut self, filter: &str) -> Result<ConfigView, AppError> {
        let filter: DateFilter = filter.parse()?;
        self.config.set_date_filter(filter, now_millis());
        self.save_config();
        Ok(self.config_view())
    }

    pub fn set_date_filter_base(&mut self, day: Option<Date>) -> ConfigView {
        self.config.set_date_filter_base(day, self.offset);
        self.save_config();
        self.config_view()
    }

    pub fn config_view(&self) -> ConfigView {
        ConfigView {
            sort_key: self.config.sort_key.to_string(),
            sort_direction: self.config.sort_direction.to_string(),
            fixed_comp_down: self.config.fixed_comp_down,
            priority_filter: self.config.priority_filter.to_string(),
            date_filter: self.config.date_filter.to_string(),
            status_filter: self.config.status_filter.to_string(),
            date_filter_base: self
                .config
                .date_filter_base
                .map(|value| format_day(value, self.offset)),
        }
    }

    /// Recomputes the visible list and persists the config and memos.
    pub fn view(&mut self) -> Vec<MemoView> {
        let views: Vec<MemoView> = project(&self.collection, &self.config, now_millis(), self.offset)
            .into_iter()
            .map(|memo| MemoView::from_memo(memo, self.offset))
            .collect();
        self.save_config();
        self.save_memos();
        views
    }

    pub fn import_csv(
        &mut self,
        path: &Path,
        prompt: &mut dyn Prompt,
    ) -> Result<ImportSummary, AppError> {
        let text = read_source(path)?;
        Ok(self.import_csv_text(&text, prompt))
    }

    pub fn import_csv_text(
        &mut self,
        text: &str,
        prompt: &mut dyn Prompt,
    ) -> ImportSummary {
        let summary = ImportService::new(
            &mut self.collection,
            prompt,
            &self.settings.default_folder,
            now_millis(),
            self.offset,
        )
        .import_text(text);
        if summary.changed() {
            self.save_memos();
        }
        summary
    }

    /// `None` after telling the user there is nothing to export.
    pub fn export_csv(&self, prompt: &mut dyn Prompt) -> Option<String> {
        if self.collection.memos.is_empty() {
            prompt.notify("There are no memos to export.");
            return None;
        }
        Some(export_memos(&self.collection.memos, self.offset))
    }

    fn require_memos(&self, ids: &[u64]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one memo id is required".to_string(),
            ));
        }
        match ids
            .iter()
            .find(|id| self.collection.find_memo(**id).is_none())
        {
            Some(missing) => Err(AppError::NotFound(*missing)),
            None => Ok(()),
        }
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Csv(CsvError),
    Settings(SettingsError),
    ParseChoice(ParseChoiceError),
    ParsePriority(ParsePriorityError),
    InvalidArgument(String),
    NotFound(u64),
    UnknownFolder(String),
    NoCurrentFolder,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
            AppError::Settings(err) => write!(f, "{}", err),
            AppError::ParseChoice(err) => write!(f, "{}", err),
            AppError::ParsePriority(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(id) => write!(f, "memo {} not found", id),
            AppError::UnknownFolder(name) => write!(f, "folder '{}' not found", name),
            AppError::NoCurrentFolder => {
                write!(f, "no folder is selected; create one with `tmemo folder add`")
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Csv(err) => Some(err),
            AppError::Settings(err) => Some(err),
            AppError::ParseChoice(err) => Some(err),
            AppError::ParsePriority(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound(_) => None,
            AppError::UnknownFolder(_) => None,
            AppError::NoCurrentFolder => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<CsvError> for AppError {
    fn from(value: CsvError) -> Self {
        AppError::Csv(value)
    }
}

impl From<SettingsError> for AppError {
    fn from(value: SettingsError) -> Self {
        AppError::Settings(value)
    }
}

impl From<ParseChoiceError> for AppError {
    fn from(value: ParseChoiceError) -> Self {
        AppError::ParseChoice(value)
    }
}

impl From<ParsePriorityError> for AppError {
    fn from(value: ParsePriorityError) -> Self {
        AppError::ParsePriority(value)
    }
}

#[cfg(test)]
mod tests;
