use std::path::PathBuf;

use serde_json::json;
use time::macros::{date, offset};
use uuid::Uuid;

use super::{App, AppError};
use crate::config::{DateFilter, SortDirection, SortKey, StatusFilter, CONFIG_KEY};
use crate::db::{SqliteStore, DEFAULT_STORE_LIMIT_BYTES};
use crate::domain::memo::DEFAULT_FOLDER_NAME;
use crate::domain::priority::Priority;
use crate::prompt::ScriptedPrompt;
use crate::settings::Settings;
use crate::storage::{DocumentStore, StorageMode, PRIMARY_KEY};

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("timememo-app-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp workspace should be creatable");
    root
}

fn db_path(root: &std::path::Path) -> String {
    root.join(".timememo/store.sqlite")
        .to_str()
        .expect("utf8 path")
        .to_string()
}

fn memory_app() -> App {
    App::open_in_memory(Settings::default(), offset!(UTC)).expect("app should open")
}

fn ids(app: &App) -> Vec<u64> {
    app.collection().memos.iter().map(|memo| memo.id).collect()
}

#[test]
fn fresh_store_starts_with_selected_default_folder() {
    let app = memory_app();
    let folders = app.folders();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].name, DEFAULT_FOLDER_NAME);
    assert_eq!(folders[0].order, 1);
    assert!(folders[0].current);

    let status = app.status();
    assert_eq!(status.storage_mode, StorageMode::Single);
    assert!(status.load_repairs.is_noop());
    assert!(app
        .storage
        .store()
        .get(PRIMARY_KEY)
        .expect("get should work")
        .is_some());
}

#[test]
fn memos_survive_reopen_and_ids_fill_gaps() {
    let root = unique_workspace();
    let path = db_path(&root);
    {
        let mut app = App::open(&path, Settings::default()).expect("app should open");
        for content in ["one", "two", "three"] {
            app.add_memo(content).expect("add should succeed");
        }
        let mut prompt = ScriptedPrompt::new([true]);
        assert!(app.delete_memo(2, &mut prompt).expect("delete should succeed"));
        let added = app.add_memo("again").expect("add should succeed");
        assert_eq!(added.id, 2);
        assert_eq!(added.priority, "medium");
        assert_eq!(added.folder_name, DEFAULT_FOLDER_NAME);
    }

    let reopened = App::open(&path, Settings::default()).expect("app should reopen");
    assert_eq!(ids(&reopened), vec![1, 3, 2]);
    assert!(reopened.status().load_repairs.is_noop());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn add_memo_rejects_blank_content_and_missing_folder() {
    let mut app = memory_app();
    assert!(matches!(
        app.add_memo("   "),
        Err(AppError::InvalidArgument(_))
    ));

    let mut prompt = ScriptedPrompt::new([true]);
    assert!(app
        .delete_folder(DEFAULT_FOLDER_NAME, &mut prompt)
        .expect("delete should succeed"));
    assert_eq!(app.collection().current_folder, None);
    assert!(matches!(app.add_memo("x"), Err(AppError::NoCurrentFolder)));
}

#[test]
fn clearing_content_deletes_the_memo() {
    let mut app = memory_app();
    app.add_memo("draft").expect("add should succeed");
    let updated = app
        .update_content(1, "final")
        .expect("update should succeed")
        .expect("memo should remain");
    assert_eq!(updated.content, "final");

    assert_eq!(app.update_content(1, "").expect("update should succeed"), None);
    assert!(app.collection().memos.is_empty());
    assert!(matches!(
        app.update_content(1, "again"),
        Err(AppError::NotFound(1))
    ));
}

#[test]
fn declined_delete_keeps_memos() {
    let mut app = memory_app();
    app.add_memo("a").expect("add should succeed");
    app.add_memo("b").expect("add should succeed");

    let mut prompt = ScriptedPrompt::new([false]);
    assert_eq!(
        app.delete_memos(&[1, 2], &mut prompt)
            .expect("delete should run"),
        0
    );
    assert_eq!(prompt.asked, vec!["Delete 2 memos?"]);
    assert_eq!(ids(&app), vec![1, 2]);

    let mut prompt = ScriptedPrompt::new([true]);
    assert!(matches!(
        app.delete_memos(&[1, 9], &mut prompt),
        Err(AppError::NotFound(9))
    ));
    assert!(prompt.asked.is_empty());
}

#[test]
fn completion_keeps_first_completion_time() {
    let mut app = memory_app();
    app.add_memo("task").expect("add should succeed");

    let done = app.set_completed(1, true).expect("complete should succeed");
    assert!(done.completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.first_completed_at, done.completed_at);

    let reopened = app.set_completed(1, false).expect("reopen should succeed");
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);
    assert_eq!(reopened.first_completed_at, done.first_completed_at);
}

#[test]
fn priority_must_be_a_known_level() {
    let mut app = memory_app();
    app.add_memo("task").expect("add should succeed");
    let view = app.set_priority(1, "high").expect("priority should be set");
    assert_eq!(view.priority, "high");
    assert_eq!(app.collection().memos[0].priority, Priority::High);

    let err = app
        .set_priority(1, "urgent")
        .expect_err("unknown priority should fail");
    assert!(matches!(err, AppError::ParsePriority(_)));
    assert!(err.to_string().contains("expected one of high, medium, low"));
}

#[test]
fn folders_are_trimmed_unique_and_ordered() {
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();

    let work = app
        .add_folder("  work ", &mut prompt)
        .expect("add should succeed")
        .expect("folder should be created");
    assert_eq!(work.name, "work");
    assert_eq!(work.order, 2);
    assert_eq!(app.collection().current_folder.as_deref(), Some("work"));

    assert_eq!(app.add_folder("   ", &mut prompt).expect("blank is ignored"), None);
    assert_eq!(app.add_folder("work", &mut prompt).expect("dup is refused"), None);
    assert_eq!(prompt.notices, vec!["Folder 'work' already exists."]);
    assert_eq!(app.folders().len(), 2);

    app.add_memo("in work").expect("add should succeed");
    assert_eq!(app.collection().memos[0].folder_name, "work");

    app.select_folder(DEFAULT_FOLDER_NAME)
        .expect("select should succeed");
    assert!(matches!(
        app.select_folder("nope"),
        Err(AppError::UnknownFolder(_))
    ));
}

#[test]
fn moving_memos_requires_an_existing_folder() {
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();
    app.add_memo("a").expect("add should succeed");
    app.add_memo("b").expect("add should succeed");
    app.add_folder("later", &mut prompt)
        .expect("add should succeed");

    assert!(matches!(
        app.move_memos(&[1], "missing"),
        Err(AppError::UnknownFolder(_))
    ));
    assert_eq!(app.move_memos(&[1, 2], "later").expect("move should work"), 2);
    assert!(app
        .collection()
        .memos
        .iter()
        .all(|memo| memo.folder_name == "later"));
}

#[test]
fn deleting_a_folder_with_memos_needs_second_confirmation() {
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();
    app.add_folder("work", &mut prompt)
        .expect("add should succeed");
    app.add_memo("w1").expect("add should succeed");
    app.add_memo("w2").expect("add should succeed");
    app.select_folder(DEFAULT_FOLDER_NAME)
        .expect("select should succeed");
    app.add_memo("d1").expect("add should succeed");
    app.select_folder("work").expect("select should succeed");

    let mut decline_second = ScriptedPrompt::new([true, false]);
    assert!(!app
        .delete_folder("work", &mut decline_second)
        .expect("delete should run"));
    assert_eq!(decline_second.asked.len(), 2);
    assert_eq!(
        decline_second.asked[1],
        "Folder 'work' still holds 2 memo(s). Delete them as well?"
    );
    assert_eq!(app.collection().memos.len(), 3);
    assert!(app.collection().has_folder("work"));

    let mut accept = ScriptedPrompt::new([true, true]);
    assert!(app
        .delete_folder("work", &mut accept)
        .expect("delete should run"));
    assert_eq!(ids(&app), vec![3]);
    assert!(!app.collection().has_folder("work"));
    assert_eq!(
        app.collection().current_folder.as_deref(),
        Some(DEFAULT_FOLDER_NAME)
    );
}

#[test]
fn rename_moves_memos_and_refuses_collisions() {
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();
    app.add_folder("work", &mut prompt)
        .expect("add should succeed");
    app.add_memo("w1").expect("add should succeed");

    assert!(!app
        .rename_folder("work", DEFAULT_FOLDER_NAME, &mut prompt)
        .expect("rename should run"));
    assert_eq!(
        prompt.notices,
        vec![format!("Folder '{}' already exists.", DEFAULT_FOLDER_NAME)]
    );

    assert!(app
        .rename_folder("work", "office", &mut prompt)
        .expect("rename should run"));
    assert_eq!(app.collection().memos[0].folder_name, "office");
    assert_eq!(app.collection().current_folder.as_deref(), Some("office"));
    assert!(!app.collection().has_folder("work"));
}

#[test]
fn config_setters_persist_immediately() {
    let root = unique_workspace();
    let path = db_path(&root);
    {
        let mut app = App::open(&path, Settings::default()).expect("app should open");
        app.set_sort_by("time").expect("sort should be set");
        app.set_sort_by("time").expect("sort should toggle");
        app.set_fixed_comp_down(true);
        app.set_status_filter("uncompleted")
            .expect("status filter should be set");
        let view = app.set_date_filter("week").expect("date filter should be set");
        assert!(view.date_filter_base.is_some());
        app.set_date_filter_base(Some(date!(2025 - 02 - 03)));
        assert!(matches!(
            app.set_priority_filter("urgent"),
            Err(AppError::ParseChoice(_))
        ));
    }

    let reopened = App::open(&path, Settings::default()).expect("app should reopen");
    let config = reopened.config();
    assert_eq!(config.sort_key, SortKey::Time);
    assert_eq!(config.sort_direction, SortDirection::Desc);
    assert!(config.fixed_comp_down);
    assert_eq!(config.status_filter, StatusFilter::Uncompleted);
    assert_eq!(config.date_filter, DateFilter::Week);
    assert_eq!(
        reopened.config_view().date_filter_base.as_deref(),
        Some("2025-02-03")
    );

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn view_filters_and_persists_config() {
    let mut app = memory_app();
    app.add_memo("open").expect("add should succeed");
    app.add_memo("done").expect("add should succeed");
    app.set_completed(2, true).expect("complete should succeed");
    app.config.status_filter = StatusFilter::Completed;

    let visible = app.view();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].content, "done");

    let stored = app
        .storage
        .store()
        .get(CONFIG_KEY)
        .expect("get should work")
        .expect("view should persist the config");
    assert_eq!(stored.body["statusFilter"], json!("completed"));
}

#[test]
fn csv_overwrite_scenario_persists() {
    let root = unique_workspace();
    let path = db_path(&root);
    {
        let mut app = App::open(&path, Settings::default()).expect("app should open");
        app.add_memo("first").expect("add should succeed");
        app.add_memo("second").expect("add should succeed");
        let mut prompt = ScriptedPrompt::new([false, true]);
        let summary = app.import_csv_text("id,content\n2,x\n", &mut prompt);
        assert_eq!(summary.overwritten_count, 1);
    }

    let reopened = App::open(&path, Settings::default()).expect("app should reopen");
    let memos = &reopened.collection().memos;
    assert_eq!(memos.len(), 2);
    assert_eq!(
        reopened
            .collection()
            .find_memo(2)
            .map(|memo| memo.content.as_str()),
        Some("x")
    );

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn import_reads_files_and_export_refuses_empty_collections() {
    let root = unique_workspace();
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();
    assert_eq!(app.export_csv(&mut prompt), None);
    assert_eq!(prompt.notices, vec!["There are no memos to export."]);

    let input = root.join("memos.csv");
    std::fs::write(&input, "id,content,folderName\n5,from file,inbox\n")
        .expect("csv should be writable");
    let summary = app
        .import_csv(&input, &mut prompt)
        .expect("import should succeed");
    assert_eq!(summary.inserted_count, 1);
    assert!(app.collection().has_folder("inbox"));

    let exported = app.export_csv(&mut prompt).expect("export should produce text");
    assert!(exported.lines().nth(1).is_some_and(|line| line.starts_with("5,from file,")));

    assert!(matches!(
        app.import_csv(&root.join("missing.csv"), &mut prompt),
        Err(AppError::Csv(_))
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn import_without_folder_uses_configured_default_folder() {
    let settings = Settings {
        default_folder: "Inbox".to_string(),
        ..Settings::default()
    };
    let mut app = App::open_in_memory(settings, offset!(UTC)).expect("app should open");
    let mut prompt = ScriptedPrompt::new([true]);
    assert!(app
        .delete_folder("Inbox", &mut prompt)
        .expect("delete should succeed"));
    assert_eq!(app.collection().current_folder, None);

    let summary = app.import_csv_text("id,content\n,x\n", &mut prompt);
    assert_eq!(summary.inserted_count, 1);
    assert_eq!(summary.synthesized_folders, vec!["Inbox".to_string()]);
    assert_eq!(app.collection().memos[0].folder_name, "Inbox");
    let folders: Vec<String> = app.folders().into_iter().map(|folder| folder.name).collect();
    assert_eq!(folders, vec!["Inbox".to_string()]);
}

#[test]
fn unterminated_quote_keeps_the_rows_before_it() {
    let mut app = memory_app();
    let mut prompt = ScriptedPrompt::default();
    let summary = app.import_csv_text("id,content\n1,good\n2,\"bad\n", &mut prompt);

    assert_eq!(summary.status, "partial");
    assert_eq!(summary.processed_count, 2);
    assert_eq!(summary.inserted_count, 1);
    assert_eq!(summary.dropped_count, 1);
    assert_eq!(
        summary.last_error.as_deref(),
        Some("record 3: quoted field opened on line 3 is never closed")
    );
    assert_eq!(ids(&app), vec![1]);
    assert_eq!(app.collection().memos[0].content, "good");
}

#[test]
fn legacy_store_is_repaired_and_rewritten_on_open() {
    let root = unique_workspace();
    let path = db_path(&root);
    std::fs::create_dir_all(root.join(".timememo")).expect("dir should be creatable");
    {
        let store = SqliteStore::open(&path, DEFAULT_STORE_LIMIT_BYTES).expect("store should open");
        store
            .put(
                PRIMARY_KEY,
                &json!({
                    "memos": [
                        {"id": 1, "content": "original era", "createdAt": 1_700_000_000_000i64,
                         "completed": true, "completedAt": 1_700_000_100_000i64},
                        {"id": 1, "content": "folder id era", "createdAt": 1_700_000_000_000i64,
                         "folderId": 7}
                    ],
                    "folders": [{"id": 7, "name": "legacy"}],
                    "currentFolder": {"id": 7, "name": "legacy"}
                }),
                None,
            )
            .expect("seed should be written");
    }

    let app = App::open(&path, Settings::default()).expect("app should open");
    let repairs = app.status().load_repairs;
    assert_eq!(repairs.reassigned_ids.len(), 1);
    assert_eq!(repairs.synthesized_folders, vec![DEFAULT_FOLDER_NAME]);
    assert_eq!(ids(&app), vec![1, 2]);
    assert_eq!(app.collection().memos[1].folder_name, "legacy");

    let stored = app
        .storage
        .store()
        .get(PRIMARY_KEY)
        .expect("get should work")
        .expect("document should exist");
    assert_eq!(stored.body["memos"][0]["folderName"], json!(DEFAULT_FOLDER_NAME));
    assert_eq!(stored.body["memos"][0]["priority"], json!("medium"));
    assert!(stored.rev.starts_with("2-"));
    drop(app);

    let reopened = App::open(&path, Settings::default()).expect("app should reopen");
    assert!(reopened.status().load_repairs.is_noop());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn small_ceiling_switches_to_chunks_and_reloads() {
    let root = unique_workspace();
    let path = db_path(&root);
    let settings = Settings {
        chunk_ceiling_bytes: 2048,
        ..Settings::default()
    };
    {
        let mut app = App::open(&path, settings.clone()).expect("app should open");
        for n in 0..40 {
            app.add_memo(&format!("memo number {n:02} {}", "-".repeat(60)))
                .expect("add should succeed");
        }
        assert_eq!(app.status().storage_mode, StorageMode::Chunked);
    }

    let reopened = App::open(&path, settings).expect("app should reopen");
    assert_eq!(reopened.status().storage_mode, StorageMode::Chunked);
    assert_eq!(ids(&reopened), (1..=40).collect::<Vec<u64>>());
    assert!(reopened.status().skipped_chunks.is_empty());

    let _ = std::fs::remove_dir_all(root);
}
