use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const HUMAN_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DAY_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Current instant truncated to the millisecond precision the store keeps.
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}

pub fn to_epoch_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// `YYYY-MM-DD HH:mm:ss` in the given offset.
pub fn format_human(value: OffsetDateTime, offset: UtcOffset) -> String {
    value
        .to_offset(offset)
        .format(HUMAN_FORMAT)
        .unwrap_or_else(|_| to_epoch_millis(value).to_string())
}

pub fn format_day(value: OffsetDateTime, offset: UtcOffset) -> String {
    value
        .to_offset(offset)
        .format(DAY_FORMAT)
        .unwrap_or_default()
}

pub fn parse_day(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DAY_FORMAT).ok()
}

/// Accepts `YYYY-MM-DD HH:mm:ss`, `YYYY-MM-DD` (local midnight) or RFC 3339.
pub fn parse_human(raw: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = PrimitiveDateTime::parse(raw, HUMAN_FORMAT) {
        return Some(value.assume_offset(offset).to_offset(UtcOffset::UTC));
    }
    if let Ok(day) = Date::parse(raw, DAY_FORMAT) {
        return Some(
            PrimitiveDateTime::new(day, Time::MIDNIGHT)
                .assume_offset(offset)
                .to_offset(UtcOffset::UTC),
        );
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .map(|value| value.to_offset(UtcOffset::UTC))
}

/// Local offset of the running process, UTC when it cannot be determined.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::{
        format_day, format_human, from_epoch_millis, parse_day, parse_human, to_epoch_millis,
    };
    use time::macros::{date, datetime, offset};
    use time::UtcOffset;

    #[test]
    fn epoch_millis_round_trip() {
        let value = datetime!(2025-03-09 08:15:30.250 UTC);
        let millis = to_epoch_millis(value);
        assert_eq!(millis, 1_741_508_130_250);
        assert_eq!(from_epoch_millis(millis), Some(value));
    }

    #[test]
    fn human_format_uses_offset() {
        let value = datetime!(2025-03-09 23:30:00 UTC);
        assert_eq!(format_human(value, UtcOffset::UTC), "2025-03-09 23:30:00");
        assert_eq!(format_human(value, offset!(+8)), "2025-03-10 07:30:00");
        assert_eq!(format_day(value, offset!(+8)), "2025-03-10");
    }

    #[test]
    fn parses_human_day_and_rfc3339_inputs() {
        let local = offset!(+8);
        assert_eq!(
            parse_human("2025-03-10 07:30:00", local),
            Some(datetime!(2025-03-09 23:30:00 UTC))
        );
        assert_eq!(
            parse_human("2025-03-10", local),
            Some(datetime!(2025-03-09 16:00:00 UTC))
        );
        assert_eq!(
            parse_human("2025-03-10T07:30:00+08:00", UtcOffset::UTC),
            Some(datetime!(2025-03-09 23:30:00 UTC))
        );
        assert_eq!(parse_human("  ", local), None);
        assert_eq!(parse_human("yesterday", local), None);
    }

    #[test]
    fn parse_day_accepts_only_calendar_days() {
        assert_eq!(parse_day(" 2025-02-03 "), Some(date!(2025 - 02 - 03)));
        assert_eq!(parse_day("2025-02-30"), None);
        assert_eq!(parse_day("2025-02-03 10:00:00"), None);
    }
}
