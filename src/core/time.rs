use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

const ISO_DATE: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

pub(crate) fn days_before(date: Date, days: i64) -> Date {
    date.checked_sub(Duration::days(days)).unwrap_or(Date::MIN)
}

/// Strict `YYYY-MM-DD` parsing of user input.
pub(crate) fn parse_iso_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), ISO_DATE).ok()
}

pub(crate) fn format_iso_date(value: Date) -> String {
    value.format(ISO_DATE).unwrap_or_else(|_| value.to_string())
}
