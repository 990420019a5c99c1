use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::domain::priority::Priority;
use crate::domain::timestamp::{from_epoch_millis, to_epoch_millis};
use crate::storage::{DocumentStore, Storage, StoreError};

pub const CONFIG_KEY: &str = "config";

macro_rules! view_choice {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $(#[default] $default:ident => $default_str:literal,)?
            $($variant:ident => $text:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            $(#[default] $default,)?
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$default,)? $($name::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$default => $default_str,)?
                    $($name::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseChoiceError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|choice| choice.as_str() == normalized)
                    .ok_or_else(|| ParseChoiceError {
                        field: $field,
                        value: value.to_string(),
                        expected: $name::ALL.iter().map(|choice| choice.as_str()).collect(),
                    })
            }
        }
    };
}

view_choice!(SortKey, "sort key" {
    #[default] Status => "status",
    Time => "time",
});

view_choice!(SortDirection, "sort direction" {
    #[default] Asc => "asc",
    Desc => "desc",
});

view_choice!(
    /// `All` or one exact priority.
    PriorityFilter, "priority filter" {
        #[default] All => "all",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
);

view_choice!(
    /// Calendar unit the view shares with the base instant.
    DateFilter, "date filter" {
        #[default] All => "all",
        Day => "day",
        Week => "week",
        Month => "month",
        Year => "year",
    }
);

view_choice!(StatusFilter, "status filter" {
    #[default] All => "all",
    Completed => "completed",
    Uncompleted => "uncompleted",
});

impl SortDirection {
    pub fn toggled(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl PriorityFilter {
    pub fn admits(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::High => priority == Priority::High,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::Low => priority == Priority::Low,
        }
    }
}

impl StatusFilter {
    pub fn admits(self, completed: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Completed => completed,
            StatusFilter::Uncompleted => !completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChoiceError {
    field: &'static str,
    value: String,
    expected: Vec<&'static str>,
}

impl fmt::Display for ParseChoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}': expected one of {}",
            self.field,
            self.value,
            self.expected.join(", ")
        )
    }
}

impl Error for ParseChoiceError {}

/// View preferences persisted as the `config` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewConfig {
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub fixed_comp_down: bool,
    pub priority_filter: PriorityFilter,
    pub date_filter: DateFilter,
    pub status_filter: StatusFilter,
    pub date_filter_base: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDocument {
    sort_key: &'static str,
    sort_direction: &'static str,
    fixed_comp_down: bool,
    priority_filter: &'static str,
    date_filter: &'static str,
    status_filter: &'static str,
    date_filter_base_time: Option<i64>,
}

impl ViewConfig {
    /// Reads a stored config. Each field that is missing or holds an unknown
    /// value takes its default on its own.
    pub fn from_document(body: &Value) -> ViewConfig {
        fn choice<T: FromStr + Default>(body: &Value, key: &str) -> T {
            body.get(key)
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default()
        }

        ViewConfig {
            sort_key: choice(body, "sortKey"),
            sort_direction: choice(body, "sortDirection"),
            fixed_comp_down: body
                .get("fixedCompDown")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            priority_filter: choice(body, "priorityFilter"),
            date_filter: choice(body, "dateFilter"),
            status_filter: choice(body, "statusFilter"),
            date_filter_base: body
                .get("dateFilterBaseTime")
                .and_then(Value::as_i64)
                .and_then(from_epoch_millis),
        }
    }

    pub fn to_document(&self) -> Value {
        let document = ConfigDocument {
            sort_key: self.sort_key.as_str(),
            sort_direction: self.sort_direction.as_str(),
            fixed_comp_down: self.fixed_comp_down,
            priority_filter: self.priority_filter.as_str(),
            date_filter: self.date_filter.as_str(),
            status_filter: self.status_filter.as_str(),
            date_filter_base_time: self.date_filter_base.map(to_epoch_millis),
        };
        serde_json::to_value(document).unwrap_or(Value::Null)
    }

    /// Picking the active key again flips the direction; a new key starts
    /// ascending.
    pub fn set_sort_by(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_key = key;
            self.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_date_filter(&mut self, filter: DateFilter, now: OffsetDateTime) {
        self.date_filter = filter;
        if filter == DateFilter::All {
            self.date_filter_base = None;
        } else if self.date_filter_base.is_none() {
            self.date_filter_base = Some(now);
        }
    }

    /// Anchors the date filter at local midnight of `day`, or clears it.
    pub fn set_date_filter_base(&mut self, day: Option<Date>, offset: UtcOffset) {
        self.date_filter_base = day.map(|day| {
            PrimitiveDateTime::new(day, Time::MIDNIGHT)
                .assume_offset(offset)
                .to_offset(UtcOffset::UTC)
        });
    }
}

pub fn load_config<S: DocumentStore>(storage: &mut Storage<S>) -> ViewConfig {
    storage
        .read(CONFIG_KEY)
        .map(|body| ViewConfig::from_document(&body))
        .unwrap_or_default()
}

pub fn save_config<S: DocumentStore>(
    storage: &mut Storage<S>,
    config: &ViewConfig,
) -> Result<String, StoreError> {
    storage.write(CONFIG_KEY, &config.to_document())
}

#[cfg(test)]
mod tests {
    use super::{
        load_config, save_config, DateFilter, PriorityFilter, SortDirection, SortKey,
        StatusFilter, ViewConfig, CONFIG_KEY,
    };
    use crate::db::{open_in_memory, SqliteStore, DEFAULT_STORE_LIMIT_BYTES};
    use crate::domain::priority::Priority;
    use crate::storage::{DocumentStore, Storage};
    use serde_json::json;
    use time::macros::{date, datetime, offset};

    fn memory_store() -> SqliteStore {
        SqliteStore::from_connection(
            open_in_memory().expect("in-memory db should open"),
            DEFAULT_STORE_LIMIT_BYTES,
        )
    }

    #[test]
    fn defaults_match_a_fresh_install() {
        let config = ViewConfig::default();
        assert_eq!(config.sort_key, SortKey::Status);
        assert_eq!(config.sort_direction, SortDirection::Asc);
        assert!(!config.fixed_comp_down);
        assert_eq!(config.priority_filter, PriorityFilter::All);
        assert_eq!(config.date_filter, DateFilter::All);
        assert_eq!(config.status_filter, StatusFilter::All);
        assert_eq!(config.date_filter_base, None);
        assert_eq!(
            config.to_document(),
            json!({
                "sortKey": "status",
                "sortDirection": "asc",
                "fixedCompDown": false,
                "priorityFilter": "all",
                "dateFilter": "all",
                "statusFilter": "all",
                "dateFilterBaseTime": null
            })
        );
    }

    #[test]
    fn unknown_stored_values_fall_back_per_field() {
        let config = ViewConfig::from_document(&json!({
            "sortKey": "time",
            "sortDirection": "sideways",
            "fixedCompDown": "yes",
            "priorityFilter": "HIGH",
            "statusFilter": 3,
            "dateFilterBaseTime": 1_741_508_130_250i64
        }));
        assert_eq!(config.sort_key, SortKey::Time);
        assert_eq!(config.sort_direction, SortDirection::Asc);
        assert!(!config.fixed_comp_down);
        assert_eq!(config.priority_filter, PriorityFilter::High);
        assert_eq!(config.date_filter, DateFilter::All);
        assert_eq!(config.status_filter, StatusFilter::All);
        assert_eq!(
            config.date_filter_base,
            Some(datetime!(2025-03-09 08:15:30.250 UTC))
        );
    }

    #[test]
    fn parse_errors_list_choices() {
        let err = "weekly"
            .parse::<DateFilter>()
            .expect_err("weekly is not a date filter");
        assert_eq!(
            err.to_string(),
            "invalid date filter 'weekly': expected one of all, day, week, month, year"
        );
    }

    #[test]
    fn sort_by_same_key_toggles_direction() {
        let mut config = ViewConfig::default();
        config.set_sort_by(SortKey::Status);
        assert_eq!(config.sort_direction, SortDirection::Desc);
        config.set_sort_by(SortKey::Time);
        assert_eq!(config.sort_key, SortKey::Time);
        assert_eq!(config.sort_direction, SortDirection::Asc);
        config.set_sort_by(SortKey::Time);
        assert_eq!(config.sort_direction, SortDirection::Desc);
    }

    #[test]
    fn date_filter_base_is_kept_until_all() {
        let mut config = ViewConfig::default();
        let first = datetime!(2025-05-01 10:00 UTC);
        config.set_date_filter(DateFilter::Week, first);
        assert_eq!(config.date_filter_base, Some(first));

        config.set_date_filter(DateFilter::Month, datetime!(2025-06-01 10:00 UTC));
        assert_eq!(config.date_filter_base, Some(first));

        config.set_date_filter(DateFilter::All, first);
        assert_eq!(config.date_filter_base, None);

        config.set_date_filter_base(Some(date!(2025 - 02 - 03)), offset!(+8));
        assert_eq!(
            config.date_filter_base,
            Some(datetime!(2025-02-02 16:00 UTC))
        );
    }

    #[test]
    fn filters_admit_matching_values() {
        assert!(PriorityFilter::All.admits(Priority::Low));
        assert!(PriorityFilter::Low.admits(Priority::Low));
        assert!(!PriorityFilter::High.admits(Priority::Medium));
        assert!(StatusFilter::Uncompleted.admits(false));
        assert!(!StatusFilter::Completed.admits(false));
    }

    #[test]
    fn config_round_trips_through_store() {
        let store = memory_store();
        let mut storage = Storage::new(&store, 4096);
        assert_eq!(load_config(&mut storage), ViewConfig::default());

        let mut config = ViewConfig::default();
        config.set_sort_by(SortKey::Time);
        config.fixed_comp_down = true;
        config.status_filter = StatusFilter::Uncompleted;
        save_config(&mut storage, &config).expect("first config write should succeed");
        config.priority_filter = PriorityFilter::Low;
        save_config(&mut storage, &config).expect("second config write should succeed");

        let stored = store
            .get(CONFIG_KEY)
            .expect("get should work")
            .expect("config should exist");
        assert!(stored.rev.starts_with("2-"));

        let mut reopened = Storage::new(&store, 4096);
        assert_eq!(load_config(&mut reopened), config);
    }
}
