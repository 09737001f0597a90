//! Local-naive ISO-8601 timestamps as stored in the config file.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use std::sync::OnceLock;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Captures the local UTC offset for the rest of the process. Must run before
/// any threads start: on Unix the offset is only readable while the process
/// is single-threaded, and later reads fall back to UTC.
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

fn local_offset() -> UtcOffset {
    LOCAL_OFFSET
        .get()
        .copied()
        .or_else(|| UtcOffset::current_local_offset().ok())
        .unwrap_or(UtcOffset::UTC)
}

pub fn to_local(value: OffsetDateTime) -> PrimitiveDateTime {
    let local = value.checked_to_offset(local_offset()).unwrap_or(value);
    PrimitiveDateTime::new(local.date(), local.time())
}

/// Current local time truncated to whole seconds.
pub fn now() -> PrimitiveDateTime {
    let now = to_local(OffsetDateTime::now_utc());
    now.replace_nanosecond(0).unwrap_or(now)
}

pub fn format(value: &PrimitiveDateTime) -> String {
    value
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| value.to_string())
}

/// Accepts whole seconds, fractional seconds and RFC 3339 with an offset.
pub fn parse(value: &str) -> Option<PrimitiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(parsed);
    }
    if let Ok(parsed) = PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Some(parsed);
    }
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .map(|parsed| PrimitiveDateTime::new(parsed.date(), parsed.time()))
}

pub fn from_unix(seconds: i64) -> Option<PrimitiveDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).ok().map(to_local)
}

pub fn serialize<S>(value: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_whole_and_fractional_seconds() {
        assert_eq!(
            parse("2024-01-01T00:00:00"),
            Some(datetime!(2024-01-01 00:00:00))
        );
        assert_eq!(
            parse("2024-03-05T10:20:30.1234567"),
            Some(datetime!(2024-03-05 10:20:30.1234567))
        );
        assert_eq!(
            parse("2024-03-05T10:20:30Z"),
            Some(datetime!(2024-03-05 10:20:30))
        );
        assert_eq!(parse("yesterday"), None);
    }

    #[test]
    fn formats_without_subseconds() {
        assert_eq!(
            format(&datetime!(2024-01-01 08:09:10.5)),
            "2024-01-01T08:09:10"
        );
    }
}
