//! Relative "N minutes ago" phrases for the panel's update timestamps.
//!
//! The backend writes timestamps in two layouts: `2026-01-02 03:04:05` in
//! server local time and `2026-01-02T03:04:05Z` in UTC. Both are accepted,
//! along with any RFC 3339 timestamp carrying an offset.
use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Bucket an elapsed duration falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeTime {
    Never,
    Invalid,
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
}

impl RelativeTime {
    /// Negative elapsed time (clock skew, future timestamps) reads as "just now".
    pub fn from_elapsed_secs(secs: i64) -> Self {
        if secs < MINUTE {
            RelativeTime::JustNow
        } else if secs < HOUR {
            RelativeTime::Minutes(secs / MINUTE)
        } else if secs < DAY {
            RelativeTime::Hours(secs / HOUR)
        } else {
            RelativeTime::Days(secs / DAY)
        }
    }

    pub fn localize(&self, locale: &str) -> String {
        match *self {
            RelativeTime::Never => t!("time.never", locale = locale).into_owned(),
            RelativeTime::Invalid => t!("time.invalid", locale = locale).into_owned(),
            RelativeTime::JustNow => t!("time.just_now", locale = locale).into_owned(),
            RelativeTime::Minutes(1) => t!("time.minute_ago", locale = locale).into_owned(),
            RelativeTime::Minutes(n) => {
                t!("time.minutes_ago", locale = locale, count = n).into_owned()
            }
            RelativeTime::Hours(1) => t!("time.hour_ago", locale = locale).into_owned(),
            RelativeTime::Hours(n) => t!("time.hours_ago", locale = locale, count = n).into_owned(),
            RelativeTime::Days(n) => t!("time.days_ago", locale = locale, count = n).into_owned(),
        }
    }
}

/// Parses a panel timestamp. Layouts without a zone are taken as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS.iter().find_map(|layout| {
        let naive = NaiveDateTime::parse_from_str(raw, layout).ok()?;
        Some(resolve_local(naive, |n| {
            Local
                .from_local_datetime(n)
                .map(|dt| dt.with_timezone(&Utc))
        }))
    })
}

/// Maps a wall-clock time to UTC. Ambiguous times take the earlier instant;
/// times skipped by a DST jump move forward an hour, and anything still
/// unresolved is read as UTC.
fn resolve_local<F>(naive: NaiveDateTime, lookup: F) -> DateTime<Utc>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<Utc>>,
{
    lookup(&naive)
        .earliest()
        .or_else(|| lookup(&(naive + chrono::Duration::hours(1))).earliest())
        .unwrap_or_else(|| naive.and_utc())
}

pub fn classify(timestamp: Option<&str>, now: DateTime<Utc>) -> RelativeTime {
    let Some(raw) = timestamp.filter(|s| !s.trim().is_empty()) else {
        return RelativeTime::Never;
    };
    match parse_timestamp(raw) {
        Some(then) => RelativeTime::from_elapsed_secs((now - then).num_seconds()),
        None => RelativeTime::Invalid,
    }
}

/// Formats `timestamp` relative to `now` in the given locale.
pub fn format_relative_at(timestamp: Option<&str>, now: DateTime<Utc>, locale: &str) -> String {
    classify(timestamp, now).localize(locale)
}

pub fn format_relative(timestamp: Option<&str>, locale: &str) -> String {
    format_relative_at(timestamp, Utc::now(), locale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn ago(secs: i64) -> String {
        (now() - Duration::seconds(secs))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }

    fn fmt_en(secs: i64) -> String {
        format_relative_at(Some(&ago(secs)), now(), "en")
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(fmt_en(0), "just now");
        assert_eq!(fmt_en(59), "just now");
        assert_eq!(fmt_en(60), "1 minute ago");
        assert_eq!(fmt_en(119), "1 minute ago");
        assert_eq!(fmt_en(120), "2 minutes ago");
        assert_eq!(fmt_en(3599), "59 minutes ago");
        assert_eq!(fmt_en(3600), "1 hour ago");
        assert_eq!(fmt_en(7199), "1 hour ago");
        assert_eq!(fmt_en(7200), "2 hours ago");
        assert_eq!(fmt_en(86399), "23 hours ago");
        assert_eq!(fmt_en(86400), "1 days ago");
        assert_eq!(fmt_en(10 * 86400 + 5), "10 days ago");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        assert_eq!(fmt_en(-3600), "just now");
    }

    #[test]
    fn test_missing_or_empty_input() {
        assert_eq!(format_relative_at(None, now(), "en"), "never updated");
        assert_eq!(format_relative_at(Some(""), now(), "en"), "never updated");
        assert_eq!(format_relative_at(Some("   "), now(), "ru"), "Никогда");
    }

    #[test]
    fn test_local_layout_is_local_time() {
        let local_then = Local.from_local_datetime(
            &NaiveDateTime::parse_from_str("2026-03-10 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        );
        let then = local_then.earliest().unwrap().with_timezone(&Utc);
        let now = then + Duration::minutes(5);

        assert_eq!(
            format_relative_at(Some("2026-03-10 08:00:00"), now, "en"),
            "5 minutes ago"
        );
    }

    #[test]
    fn test_local_layout_bucket_boundaries() {
        let then = parse_timestamp("2026-03-10 08:00:00").unwrap();
        let fmt_local = |secs: i64| {
            format_relative_at(Some("2026-03-10 08:00:00"), then + Duration::seconds(secs), "en")
        };

        assert_eq!(fmt_local(-30), "just now");
        assert_eq!(fmt_local(59), "just now");
        assert_eq!(fmt_local(60), "1 minute ago");
        assert_eq!(fmt_local(119), "1 minute ago");
        assert_eq!(fmt_local(120), "2 minutes ago");
        assert_eq!(fmt_local(3599), "59 minutes ago");
        assert_eq!(fmt_local(3600), "1 hour ago");
        assert_eq!(fmt_local(7199), "1 hour ago");
        assert_eq!(fmt_local(7200), "2 hours ago");
        assert_eq!(fmt_local(86399), "23 hours ago");
        assert_eq!(fmt_local(86400), "1 days ago");
        assert_eq!(fmt_local(3 * 86400), "3 days ago");
    }

    /// A zone three hours ahead of UTC that skips 02:00..03:00 local time.
    fn gap_zone(naive: &NaiveDateTime) -> LocalResult<DateTime<Utc>> {
        let gap_start = NaiveDateTime::parse_from_str("2026-03-29 02:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        if *naive >= gap_start && *naive < gap_start + Duration::hours(1) {
            return LocalResult::None;
        }
        LocalResult::Single((*naive - Duration::hours(3)).and_utc())
    }

    #[test]
    fn test_time_in_dst_gap_moves_forward() {
        let skipped = NaiveDateTime::parse_from_str("2026-03-29 02:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let resolved = resolve_local(skipped, gap_zone);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2026, 3, 29, 0, 30, 0).unwrap());

        let regular = NaiveDateTime::parse_from_str("2026-03-29 05:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            resolve_local(regular, gap_zone),
            Utc.with_ymd_and_hms(2026, 3, 29, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unresolvable_local_time_reads_as_utc() {
        let naive = NaiveDateTime::parse_from_str("2026-03-29 02:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let resolved = resolve_local(naive, |_| LocalResult::None);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2026, 3, 29, 2, 30, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let parsed = parse_timestamp("2026-03-10T15:00:00+03:00").unwrap();
        assert_eq!(parsed, now());
    }

    #[test]
    fn test_unparseable_input() {
        assert_eq!(classify(Some("yesterday"), now()), RelativeTime::Invalid);
        assert_eq!(
            format_relative_at(Some("yesterday"), now(), "en"),
            "invalid date"
        );
    }

    #[test]
    fn test_russian_phrases() {
        let ts = ago(5 * 60);
        assert_eq!(format_relative_at(Some(&ts), now(), "ru"), "5 мин. назад");
        assert_eq!(
            format_relative_at(Some(&ago(90)), now(), "ru"),
            "1 минуту назад"
        );
    }

    #[test]
    fn test_unknown_locale_falls_back_to_english() {
        assert_eq!(format_relative_at(Some(&ago(30)), now(), "xx"), "just now");
    }
}
