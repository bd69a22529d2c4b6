use chrono::{DateTime, Utc};

/// Whether an item stamped `timestamp` is newer than `watermark`.
///
/// Missing or unparsable timestamps count as newer so that bad dates are
/// re-extracted rather than dropped.
pub fn is_after_watermark(timestamp: Option<&str>, watermark: DateTime<Utc>) -> bool {
    match timestamp.map(DateTime::parse_from_rfc3339) {
        Some(Ok(t)) => t.with_timezone(&Utc) > watermark,
        _ => true,
    }
}

/// Keep the items newer than `since`, or all of them when `since` is `None`.
pub fn filter_since<T, F>(items: Vec<T>, since: Option<DateTime<Utc>>, timestamp: F) -> Vec<T>
where
    F: Fn(&T) -> Option<&str>,
{
    let Some(watermark) = since else {
        return items;
    };
    items
        .into_iter()
        .filter(|item| is_after_watermark(timestamp(item), watermark))
        .collect()
}
