use time::macros::{datetime, offset};
use time::OffsetDateTime;

use super::project;
use crate::config::{DateFilter, PriorityFilter, SortDirection, SortKey, StatusFilter, ViewConfig};
use crate::domain::memo::{Folder, Memo, MemoCollection};
use crate::domain::priority::Priority;

const NOW: OffsetDateTime = datetime!(2025-01-01 10:00 UTC);

fn memo(id: u64, folder: &str, created_at: OffsetDateTime, completed: bool) -> Memo {
    let mut memo = Memo::new(id, &format!("memo {id}"), folder, created_at);
    if completed {
        memo.set_completed(true, created_at);
    }
    memo
}

fn collection(memos: Vec<Memo>, current: Option<&str>) -> MemoCollection {
    MemoCollection {
        memos,
        folders: vec![Folder::new("work", 1), Folder::new("home", 2)],
        current_folder: current.map(str::to_string),
    }
}

fn ids(memos: &[&Memo]) -> Vec<u64> {
    memos.iter().map(|memo| memo.id).collect()
}

#[test]
fn current_folder_limits_the_view() {
    let all = collection(
        vec![
            memo(1, "work", NOW, false),
            memo(2, "home", NOW, false),
            memo(3, "work", NOW, false),
        ],
        Some("work"),
    );
    let config = ViewConfig::default();
    assert_eq!(ids(&project(&all, &config, NOW, offset!(UTC))), vec![1, 3]);

    let unselected = MemoCollection {
        current_folder: None,
        ..all
    };
    assert_eq!(
        ids(&project(&unselected, &config, NOW, offset!(UTC))),
        vec![1, 2, 3]
    );
}

#[test]
fn priority_and_status_filters_are_exact() {
    let mut high = memo(1, "work", NOW, false);
    high.priority = Priority::High;
    let items = collection(
        vec![high, memo(2, "work", NOW, true), memo(3, "work", NOW, false)],
        Some("work"),
    );

    let by_priority = ViewConfig {
        priority_filter: PriorityFilter::High,
        ..ViewConfig::default()
    };
    assert_eq!(ids(&project(&items, &by_priority, NOW, offset!(UTC))), vec![1]);

    let done = ViewConfig {
        status_filter: StatusFilter::Completed,
        ..ViewConfig::default()
    };
    assert_eq!(ids(&project(&items, &done, NOW, offset!(UTC))), vec![2]);
}

#[test]
fn week_filter_uses_iso_week_and_year() {
    // 2024-12-30 falls in ISO week 1 of 2025 together with 2025-01-01.
    let items = collection(
        vec![
            memo(1, "work", datetime!(2024-12-30 09:00 UTC), false),
            memo(2, "work", datetime!(2024-12-29 09:00 UTC), false),
            memo(3, "work", datetime!(2026-01-01 09:00 UTC), false),
        ],
        None,
    );
    let config = ViewConfig {
        date_filter: DateFilter::Week,
        ..ViewConfig::default()
    };
    assert_eq!(ids(&project(&items, &config, NOW, offset!(UTC))), vec![1]);
}

#[test]
fn day_filter_follows_the_local_calendar() {
    let items = collection(
        vec![
            memo(1, "work", datetime!(2025-03-01 17:00 UTC), false),
            memo(2, "work", datetime!(2025-03-01 15:00 UTC), false),
        ],
        None,
    );
    let config = ViewConfig {
        date_filter: DateFilter::Day,
        date_filter_base: Some(datetime!(2025-03-02 01:00 UTC)),
        ..ViewConfig::default()
    };
    // At +08:00 the first memo lands on 2025-03-02 with the base.
    assert_eq!(ids(&project(&items, &config, NOW, offset!(+8))), vec![1]);
    assert!(project(&items, &config, NOW, offset!(UTC)).is_empty());
}

#[test]
fn month_and_year_filters_compare_calendar_units() {
    let items = collection(
        vec![
            memo(1, "work", datetime!(2025-01-20 09:00 UTC), false),
            memo(2, "work", datetime!(2025-02-20 09:00 UTC), false),
            memo(3, "work", datetime!(2024-01-20 09:00 UTC), false),
        ],
        None,
    );
    let month = ViewConfig {
        date_filter: DateFilter::Month,
        ..ViewConfig::default()
    };
    assert_eq!(ids(&project(&items, &month, NOW, offset!(UTC))), vec![1]);

    let year = ViewConfig {
        date_filter: DateFilter::Year,
        ..ViewConfig::default()
    };
    assert_eq!(ids(&project(&items, &year, NOW, offset!(UTC))), vec![1, 2]);
}

#[test]
fn time_sort_with_pin_keeps_completed_last_in_time_order() {
    let items = collection(
        vec![
            memo(1, "work", datetime!(2025-01-03 00:00 UTC), true),
            memo(2, "work", datetime!(2025-01-01 00:00 UTC), false),
            memo(3, "work", datetime!(2025-01-02 00:00 UTC), true),
            memo(4, "work", datetime!(2025-01-04 00:00 UTC), false),
        ],
        None,
    );
    let mut config = ViewConfig {
        sort_key: SortKey::Time,
        fixed_comp_down: true,
        ..ViewConfig::default()
    };
    assert_eq!(
        ids(&project(&items, &config, NOW, offset!(UTC))),
        vec![2, 4, 3, 1]
    );

    config.sort_direction = SortDirection::Desc;
    assert_eq!(
        ids(&project(&items, &config, NOW, offset!(UTC))),
        vec![4, 2, 1, 3]
    );

    config.fixed_comp_down = false;
    assert_eq!(
        ids(&project(&items, &config, NOW, offset!(UTC))),
        vec![4, 1, 3, 2]
    );
}

#[test]
fn status_sort_keeps_collection_order_within_groups() {
    let items = collection(
        vec![
            memo(1, "work", NOW, true),
            memo(2, "work", NOW, false),
            memo(3, "work", NOW, true),
            memo(4, "work", NOW, false),
        ],
        None,
    );
    let asc = ViewConfig::default();
    assert_eq!(
        ids(&project(&items, &asc, NOW, offset!(UTC))),
        vec![2, 4, 1, 3]
    );

    let desc = ViewConfig {
        sort_direction: SortDirection::Desc,
        ..ViewConfig::default()
    };
    assert_eq!(
        ids(&project(&items, &desc, NOW, offset!(UTC))),
        vec![1, 3, 2, 4]
    );
}
