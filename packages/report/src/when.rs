//! Normalization of the free-form incident time.
//!
//! Only forms that can be read without guessing are accepted. Anything
//! else leaves `occurred_at` unknown and the reporter's wording stays in
//! `when_text`.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<count>an?|\d{1,4})\s+(?P<unit>minute|hour|day|week)s?\s+ago$")
        .unwrap_or_else(|_| unreachable!())
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%B %d %Y"];

/// Hour used for "last night".
const LAST_NIGHT_HOUR: u32 = 22;

/// Parses `text` into an instant.
///
/// Naive dates and times are read in `offset`, and relative phrases are
/// resolved against `now`. A bare date resolves to local midnight.
#[must_use]
pub fn normalize_when(text: &str, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let text = text.trim().trim_end_matches('.').trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }

    let lower = text.to_ascii_lowercase();
    if let Some(at) = relative(&lower, now, offset) {
        return Some(at);
    }

    let local = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })?;

    to_utc(local, offset)
}

fn relative(lower: &str, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    match lower {
        "now" | "just now" | "right now" | "today" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        "last night" => {
            let yesterday = now.with_timezone(&offset).date_naive().pred_opt()?;
            let at = yesterday.and_hms_opt(LAST_NIGHT_HOUR, 0, 0)?;
            return to_utc(at, offset);
        }
        _ => {}
    }

    let caps = RELATIVE_RE.captures(lower)?;
    let count = match &caps["count"] {
        "a" | "an" => 1,
        digits => digits.parse::<i64>().ok()?,
    };
    let span = match &caps["unit"] {
        "minute" => Duration::minutes(count),
        "hour" => Duration::hours(count),
        "day" => Duration::days(count),
        "week" => Duration::weeks(count),
        _ => return None,
    };

    now.checked_sub_signed(span)
}

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-10T18:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn central() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(
            normalize_when("2024-03-09T21:15:00-06:00", now(), central()),
            Some(at("2024-03-10T03:15:00Z"))
        );
    }

    #[test]
    fn reads_naive_times_in_local_offset() {
        assert_eq!(
            normalize_when("2024-03-09 21:15", now(), central()),
            Some(at("2024-03-10T03:15:00Z"))
        );
        assert_eq!(
            normalize_when("03/09/2024 9:15 PM", now(), central()),
            Some(at("2024-03-10T03:15:00Z"))
        );
        assert_eq!(
            normalize_when("March 9, 2024", now(), central()),
            Some(at("2024-03-09T06:00:00Z"))
        );
        assert_eq!(
            normalize_when("2024-03-09", now(), central()),
            Some(at("2024-03-09T06:00:00Z"))
        );
    }

    #[test]
    fn resolves_relative_phrases() {
        assert_eq!(normalize_when("now", now(), central()), Some(now()));
        assert_eq!(
            normalize_when("Yesterday", now(), central()),
            Some(at("2024-03-09T18:30:00Z"))
        );
        assert_eq!(
            normalize_when("2 hours ago", now(), central()),
            Some(at("2024-03-10T16:30:00Z"))
        );
        assert_eq!(
            normalize_when("an hour ago.", now(), central()),
            Some(at("2024-03-10T17:30:00Z"))
        );
        assert_eq!(
            normalize_when("3 days ago", now(), central()),
            Some(at("2024-03-07T18:30:00Z"))
        );
    }

    #[test]
    fn last_night_is_previous_local_evening() {
        // 18:30Z is 12:30 local, so last night is March 9th 22:00 local.
        assert_eq!(
            normalize_when("last night", now(), central()),
            Some(at("2024-03-10T04:00:00Z"))
        );
    }

    #[test]
    fn vague_text_is_unknown() {
        assert_eq!(normalize_when("around lunchtime", now(), central()), None);
        assert_eq!(normalize_when("N/A", now(), central()), None);
        assert_eq!(normalize_when("", now(), central()), None);
    }
}
