//! Archive host detection and snapshot timestamp validation

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};

/// Substrings identifying hosts that only serve archived copies
const ARCHIVE_HOSTS: &[&str] = &[
    "web.archive.org",
    "archive.org/web/",
    "archive.today",
    "archive.is",
    "archive.ph",
    "archive.fo",
    "archive.li",
    "archive.md",
    "archive.vn",
    "webcitation.org",
    "perma.cc",
    "archive-it.org",
    "webarchive.org.uk",
    "webarchive.nationalarchives.gov.uk",
    "arquivo.pt",
    "webarchive.library.unt.edu",
    "webarchive.loc.gov",
    "swap.stanford.edu",
    "vefsafn.is",
    "screenshots.com",
];

/// Snapshot timestamp layout, `YYYYMMDDHHMMSS`
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Upstream indexing can run slightly ahead of our clock
const FUTURE_TOLERANCE_DAYS: i64 = 7;

/// True when the URL already points at an archived copy
pub fn is_archive_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    ARCHIVE_HOSTS.iter().any(|host| lower.contains(host))
}

/// The Wayback Machine began capturing on 1996-03-01
fn wayback_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1996, 3, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Validate a snapshot timestamp against the current time
pub fn is_valid_archive_timestamp(timestamp: &str) -> bool {
    is_valid_archive_timestamp_at(timestamp, Utc::now())
}

/// Validate a snapshot timestamp against `now`
pub fn is_valid_archive_timestamp_at(timestamp: &str, now: DateTime<Utc>) -> bool {
    if timestamp.len() != 14 || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let Ok(parsed) = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT) else {
        return false;
    };
    // chrono reads second 60 as a leap second; snapshot timestamps never carry one
    if parsed.nanosecond() >= 1_000_000_000 {
        return false;
    }
    let parsed = parsed.and_utc();

    parsed >= wayback_start() && parsed <= now + Duration::days(FUTURE_TOLERANCE_DAYS)
}
