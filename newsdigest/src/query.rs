use chrono::Local;

use crate::topics::{DigestLang, PRESET_TOPICS};

/// One search to run: the label articles get tagged with, and the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicQuery {
    pub label: String,
    pub query: String,
}

/// Build search queries for the current month.
///
/// Presets come first in catalog order, then custom topics in insertion order.
/// Unknown preset ids are ignored. No topics yields an empty list.
pub fn build_search_queries(
    enabled_topics: &[String],
    custom_topics: &[String],
    lang: DigestLang,
) -> Vec<TopicQuery> {
    let month = Local::now().format("%Y-%m").to_string();
    build_search_queries_for_month(enabled_topics, custom_topics, lang, &month)
}

pub fn build_search_queries_for_month(
    enabled_topics: &[String],
    custom_topics: &[String],
    lang: DigestLang,
    month: &str,
) -> Vec<TopicQuery> {
    let presets = PRESET_TOPICS
        .iter()
        .filter(|t| enabled_topics.iter().any(|id| id == t.id))
        .map(|t| t.name(lang));

    presets
        .chain(custom_topics.iter().map(String::as_str))
        .map(|label| TopicQuery {
            label: label.to_string(),
            query: format!("{} {} {}", label, lang.news_suffix(), month),
        })
        .collect()
}
