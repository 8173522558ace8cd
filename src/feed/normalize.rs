use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::types::FeedItem;

/// Number of items kept per feed after sorting.
pub const MAX_ITEMS: usize = 10;

/// Orders items newest first and keeps the first [`MAX_ITEMS`].
///
/// Items whose date cannot be parsed sort after every dated item. The sort is
/// stable, so ties (and all undated items) keep their document order.
pub fn normalize_items(items: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut keyed: Vec<(Option<i64>, FeedItem)> = items
        .into_iter()
        .map(|item| (parse_published(&item.published_at), item))
        .collect();

    // Option orders None below Some, so reversing puts undated items last
    keyed.sort_by(|(a, _), (b, _)| b.cmp(a));
    keyed.truncate(MAX_ITEMS);

    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Parses the date formats feeds use in practice into a millisecond timestamp.
///
/// Accepts RFC 2822 (RSS `pubDate`), RFC 3339 (Atom), ISO date-times with a
/// colonless offset or none at all, and bare `YYYY-MM-DD` dates; dates without
/// an offset are taken as UTC.
///
/// The RFC 2822 weekday is ignored: feeds routinely publish a weekday that
/// does not match the date, and the date is what orders items.
pub fn parse_published(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(strip_weekday(s)) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Drops a leading `Mon, ` style weekday so it cannot contradict the date.
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((day, rest)) if !day.is_empty() && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => s,
    }
}
