use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

pub mod duckduckgo;

pub use duckduckgo::DuckDuckGoNews;

/// A candidate result stub returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Publish date as reported by the provider; may be unparseable.
    pub date: String,
    /// Label of the topic query that produced this result.
    pub label: String,
}

/// Web search backend returning recent news for a query.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn news(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Search one topic and apply the since-cutoff.
///
/// Asks the provider for twice the cap so date filtering still leaves enough
/// results. Provider failures are logged and yield an empty list.
pub async fn search_news<P: SearchProvider + ?Sized>(
    provider: &P,
    label: &str,
    query: &str,
    max_results: usize,
    since: Option<DateTime<Utc>>,
) -> Vec<SearchResult> {
    match provider.news(query, max_results * 2).await {
        Ok(results) => {
            let fetched = results.len();
            let kept: Vec<SearchResult> = filter_since(results, since, max_results)
                .into_iter()
                .map(|r| SearchResult {
                    label: label.to_string(),
                    ..r
                })
                .collect();
            debug!(query, fetched, kept = kept.len(), "search: results filtered");
            kept
        }
        Err(e) => {
            warn!(query, "search: provider failed: {:#}", e);
            Vec::new()
        }
    }
}

/// Keep results published strictly after `since`, at most `max_results`.
///
/// Results whose date cannot be parsed are kept.
pub fn filter_since(
    results: Vec<SearchResult>,
    since: Option<DateTime<Utc>>,
    max_results: usize,
) -> Vec<SearchResult> {
    let Some(since) = since else {
        return results.into_iter().take(max_results).collect();
    };

    results
        .into_iter()
        .filter(|r| match parse_timestamp(&r.date) {
            Some(published) => published > since,
            None => true,
        })
        .take(max_results)
        .collect()
}

/// Parse a loosely formatted timestamp. Values without a zone are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    // Short digit runs are years or day numbers, not epoch seconds
    if s.len() >= 9 && s.chars().all(|c| c.is_ascii_digit()) {
        let secs: i64 = s.parse().ok()?;
        return Utc.timestamp_opt(secs, 0).single();
    }

    None
}
