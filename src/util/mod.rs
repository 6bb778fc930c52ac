use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

pub(crate) trait Clock {
    fn now_ms(&self) -> i64;
}

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Milliseconds since the epoch for a server timestamp.
///
/// Rows written as `timestamp without time zone` arrive without an offset;
/// those are read as UTC.
pub(crate) fn parse_timestamp_ms(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let dt = OffsetDateTime::parse(s, &Rfc3339).ok().or_else(|| {
        PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                s,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .ok()
        .map(PrimitiveDateTime::assume_utc)
    })?;

    Some((dt.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub(crate) fn format_timestamp(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|dt| {
            dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_default()
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
