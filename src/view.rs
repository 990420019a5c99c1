use std::cmp::Reverse;

use time::{OffsetDateTime, UtcOffset};

use crate::config::{DateFilter, SortDirection, SortKey, ViewConfig};
use crate::domain::memo::{Memo, MemoCollection};

/// Filters and sorts the collection for display. Memos outside the current
/// folder are hidden only while a folder is selected.
pub fn project<'a>(
    collection: &'a MemoCollection,
    config: &ViewConfig,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Vec<&'a Memo> {
    let base = config.date_filter_base.unwrap_or(now).to_offset(offset);
    let folder = collection.current_folder.as_deref();

    let mut memos: Vec<&Memo> = collection
        .memos
        .iter()
        .filter(|memo| folder.map_or(true, |name| memo.folder_name == name))
        .filter(|memo| config.priority_filter.admits(memo.priority))
        .filter(|memo| config.status_filter.admits(memo.completed))
        .filter(|memo| {
            same_period(
                config.date_filter,
                memo.created_at.to_offset(offset),
                base,
            )
        })
        .collect();

    sort_memos(&mut memos, config);
    memos
}

/// Both instants must already be in the display offset.
fn same_period(filter: DateFilter, value: OffsetDateTime, base: OffsetDateTime) -> bool {
    match filter {
        DateFilter::All => true,
        DateFilter::Day => value.date() == base.date(),
        DateFilter::Week => {
            let (year, week, _) = value.to_iso_week_date();
            let (base_year, base_week, _) = base.to_iso_week_date();
            year == base_year && week == base_week
        }
        DateFilter::Month => value.year() == base.year() && value.month() == base.month(),
        DateFilter::Year => value.year() == base.year(),
    }
}

fn sort_memos(memos: &mut [&Memo], config: &ViewConfig) {
    match (config.sort_key, config.sort_direction) {
        (SortKey::Time, direction) => {
            match direction {
                SortDirection::Asc => memos.sort_by_key(|memo| memo.created_at),
                SortDirection::Desc => memos.sort_by_key(|memo| Reverse(memo.created_at)),
            }
            if config.fixed_comp_down {
                memos.sort_by_key(|memo| memo.completed);
            }
        }
        (SortKey::Status, SortDirection::Asc) => memos.sort_by_key(|memo| memo.completed),
        (SortKey::Status, SortDirection::Desc) => {
            memos.sort_by_key(|memo| Reverse(memo.completed))
        }
    }
}

#[cfg(test)]
#[path = "view_tests_ext.rs"]
mod tests_ext;
