use std::fmt;
use std::path::Path;

use time::{OffsetDateTime, UtcOffset};

use crate::domain::memo::Memo;
use crate::domain::priority::Priority;
use crate::domain::timestamp::{from_epoch_millis, parse_human};

use super::errors::CsvError;

pub fn read_source(path: &Path) -> Result<String, CsvError> {
    Ok(std::fs::read_to_string(path)?)
}

/// Header positions of every column the importer understands. Older exports
/// used `created` and `folderId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Columns {
    width: usize,
    id: Option<usize>,
    content: Option<usize>,
    created_at: Option<usize>,
    created_num: Option<usize>,
    completed: Option<usize>,
    completed_at: Option<usize>,
    completed_num: Option<usize>,
    first_completed_at: Option<usize>,
    first_completed_num: Option<usize>,
    folder_name: Option<usize>,
    priority: Option<usize>,
}

impl Columns {
    pub fn resolve(header: &[String]) -> Columns {
        let find = |name: &str| header.iter().position(|column| column.trim() == name);
        Columns {
            width: header.len(),
            id: find("id"),
            content: find("content"),
            created_at: find("createdAt").or_else(|| find("created")),
            created_num: find("createdNum"),
            completed: find("completed"),
            completed_at: find("completedAt"),
            completed_num: find("completedNum"),
            first_completed_at: find("firstCompletedAt"),
            first_completed_num: find("firstCompletedNum"),
            folder_name: find("folderName").or_else(|| find("folderId")),
            priority: find("priority"),
        }
    }
}

/// Values the importer falls back on for fields a row leaves out.
#[derive(Debug, Clone, Copy)]
pub struct RowDefaults<'a> {
    pub folder_name: &'a str,
    pub now: OffsetDateTime,
    pub offset: UtcOffset,
}

/// A parsed row. `requested_id` is `None` when the row had no usable id.
/// `memo.id` is only a placeholder until the row is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMemo {
    pub requested_id: Option<u64>,
    pub memo: Memo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    TooFewFields { expected: usize, found: usize },
    BadTimestamp { column: &'static str, value: String },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::TooFewFields { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            RowError::BadTimestamp { column, value } => {
                write!(f, "unreadable {} '{}'", column, value)
            }
        }
    }
}

pub fn parse_row(
    row: &[String],
    columns: &Columns,
    defaults: &RowDefaults<'_>,
) -> Result<IncomingMemo, RowError> {
    if row.len() < columns.width {
        return Err(RowError::TooFewFields {
            expected: columns.width,
            found: row.len(),
        });
    }
    let cell = |position: Option<usize>| position.map(|position| row[position].as_str());

    let created_at = instant(
        cell(columns.created_num),
        cell(columns.created_at),
        "createdAt",
        defaults.offset,
    )?;
    let completed_at = instant(
        cell(columns.completed_num),
        cell(columns.completed_at),
        "completedAt",
        defaults.offset,
    )?;
    let first_completed_at = instant(
        cell(columns.first_completed_num),
        cell(columns.first_completed_at),
        "firstCompletedAt",
        defaults.offset,
    )?;

    let folder_name = cell(columns.folder_name)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(defaults.folder_name);

    Ok(IncomingMemo {
        requested_id: cell(columns.id).and_then(parse_id),
        memo: Memo {
            id: 0,
            content: cell(columns.content).unwrap_or_default().to_string(),
            created_at: created_at.unwrap_or(defaults.now),
            completed: cell(columns.completed)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
            completed_at,
            first_completed_at: first_completed_at.or(completed_at),
            folder_name: folder_name.to_string(),
            priority: Priority::from_stored(cell(columns.priority)),
        },
    })
}

/// Positive integral ids only. `"7.0"` counts, `"0"` and `"-3"` do not.
fn parse_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<u64>() {
        return (id > 0).then_some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
        .then_some(value as u64)
}

/// The epoch column wins when it holds anything. A non-empty value that
/// cannot be read rejects the row.
fn instant(
    epoch: Option<&str>,
    human: Option<&str>,
    column: &'static str,
    offset: UtcOffset,
) -> Result<Option<OffsetDateTime>, RowError> {
    let epoch = epoch.map(str::trim).filter(|value| !value.is_empty());
    let human = human.map(str::trim).filter(|value| !value.is_empty());
    let (raw, parsed) = match (epoch, human) {
        (Some(raw), _) => (raw, parse_epoch(raw)),
        (None, Some(raw)) => (raw, parse_epoch(raw).or_else(|| parse_human(raw, offset))),
        (None, None) => return Ok(None),
    };
    parsed.map(Some).ok_or_else(|| RowError::BadTimestamp {
        column,
        value: raw.to_string(),
    })
}

fn parse_epoch(raw: &str) -> Option<OffsetDateTime> {
    match raw.parse::<i64>() {
        Ok(millis) => from_epoch_millis(millis),
        Err(_) => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .and_then(|value| from_epoch_millis(value as i64)),
    }
}
