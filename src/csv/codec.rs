use std::borrow::Cow;
use std::mem;

use time::{OffsetDateTime, UtcOffset};

use crate::domain::memo::Memo;
use crate::domain::timestamp::{format_human, to_epoch_millis};

use super::errors::CsvError;

pub const EXPORT_HEADER: [&str; 11] = [
    "id",
    "content",
    "createdAt",
    "completed",
    "completedAt",
    "firstCompletedAt",
    "folderName",
    "priority",
    "createdNum",
    "firstCompletedNum",
    "completedNum",
];

/// Quotes a field when it holds a comma, double quote, CR or LF.
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn write_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (position, field) in fields.iter().enumerate() {
        if position > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push('\n');
}

/// One export row per memo, in collection order.
pub fn export_memos(memos: &[Memo], offset: UtcOffset) -> String {
    let mut out = String::new();
    write_record(&mut out, &EXPORT_HEADER);
    let human = |value: Option<OffsetDateTime>| {
        value
            .map(|value| format_human(value, offset))
            .unwrap_or_default()
    };
    let millis = |value: Option<OffsetDateTime>| {
        value
            .map(|value| to_epoch_millis(value).to_string())
            .unwrap_or_default()
    };
    for memo in memos {
        write_record(
            &mut out,
            &[
                memo.id.to_string(),
                memo.content.clone(),
                human(Some(memo.created_at)),
                memo.completed.to_string(),
                human(memo.completed_at),
                human(memo.first_completed_at),
                memo.folder_name.clone(),
                memo.priority.as_str().to_string(),
                millis(Some(memo.created_at)),
                millis(memo.first_completed_at),
                millis(memo.completed_at),
            ],
        );
    }
    out
}

#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub records: Vec<Vec<String>>,
    /// Set when a quoted field never closes. The record holding it runs to
    /// the end of the text and is left out of `records`.
    pub unterminated: Option<CsvError>,
}

/// Splits RFC 4180 text into records. Quoted fields may span lines, `""`
/// inside quotes is a literal quote, and records holding nothing but
/// whitespace are dropped. A leading byte order mark is ignored.
pub fn parse_records(text: &str) -> ParsedRecords {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => {
                    if ch == '\n' {
                        line += 1;
                    }
                    field.push(ch);
                }
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => record.push(mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => {
                line += 1;
                finish_record(&mut records, &mut record, &mut field);
            }
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return ParsedRecords {
            records,
            unterminated: Some(CsvError::UnterminatedQuote { line: quote_line }),
        };
    }
    if !field.is_empty() || !record.is_empty() {
        finish_record(&mut records, &mut record, &mut field);
    }
    ParsedRecords {
        records,
        unterminated: None,
    }
}

fn finish_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    record.push(mem::take(field));
    let done = mem::take(record);
    if done.len() == 1 && done[0].trim().is_empty() {
        return;
    }
    records.push(done);
}
