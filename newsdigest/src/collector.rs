use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::query::{build_search_queries, TopicQuery};
use crate::scraping::{Article, ArticleFetcher, FetchSettings};
use crate::search::{search_news, SearchProvider};
use crate::topics::DigestLang;

/// Fans search + fetch out over all of a user's topics.
pub struct Collector {
    search: Arc<dyn SearchProvider>,
    fetch_settings: FetchSettings,
    max_results_per_topic: usize,
}

impl Collector {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetch_settings: FetchSettings,
        max_results_per_topic: usize,
    ) -> Self {
        Self {
            search,
            fetch_settings,
            max_results_per_topic,
        }
    }

    /// Collect deduplicated articles for the given topics.
    ///
    /// An empty result is a normal outcome (no topics, or nothing usable found).
    pub async fn collect_all_news(
        &self,
        enabled_topics: &[String],
        custom_topics: &[String],
        lang: DigestLang,
        since: Option<DateTime<Utc>>,
    ) -> Vec<Article> {
        let queries = build_search_queries(enabled_topics, custom_topics, lang);
        self.collect_for_queries(queries, lang, since).await
    }

    pub async fn collect_for_queries(
        &self,
        queries: Vec<TopicQuery>,
        lang: DigestLang,
        since: Option<DateTime<Utc>>,
    ) -> Vec<Article> {
        if queries.is_empty() {
            return Vec::new();
        }

        // Scoped to this run: dropped (with its connections) when we return.
        let fetcher = match ArticleFetcher::new(self.fetch_settings.clone(), lang) {
            Ok(f) => Arc::new(f),
            Err(e) => {
                warn!("collector: could not build article fetcher: {:#}", e);
                return Vec::new();
            }
        };

        info!(topics = queries.len(), since = ?since, "collector: starting run");

        let handles: Vec<_> = queries
            .into_iter()
            .map(|topic| {
                let search = self.search.clone();
                let fetcher = fetcher.clone();
                let cap = self.max_results_per_topic;
                tokio::spawn(async move {
                    fetch_articles_for_topic(search.as_ref(), &fetcher, &topic, cap, since).await
                })
            })
            .collect();

        let mut all_articles = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(articles) => all_articles.extend(articles),
                Err(e) => warn!("collector: topic task failed: {}", e),
            }
        }

        let collected = all_articles.len();
        let unique = dedup_by_url(all_articles);
        info!(collected, unique = unique.len(), "collector: run finished");
        unique
    }
}

/// Search one topic and fetch its results concurrently, dropping failures.
pub async fn fetch_articles_for_topic(
    search: &dyn SearchProvider,
    fetcher: &ArticleFetcher,
    topic: &TopicQuery,
    max_results: usize,
    since: Option<DateTime<Utc>>,
) -> Vec<Article> {
    let results = search_news(search, &topic.label, &topic.query, max_results, since).await;
    if results.is_empty() {
        return Vec::new();
    }

    let fetches = results
        .iter()
        .take(max_results)
        .map(|r| fetcher.fetch(&r.url, &topic.label));

    let articles: Vec<Article> = join_all(fetches).await.into_iter().flatten().collect();
    info!(
        topic = %topic.label,
        found = results.len(),
        parsed = articles.len(),
        "collector: topic done"
    );
    articles
}

/// Drop later articles whose URL was already seen, preserving order.
pub fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, topic: &str) -> Article {
        Article {
            title: url.to_string(),
            body: "body".to_string(),
            url: url.to_string(),
            domain: "example.com".to_string(),
            topic: topic.to_string(),
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let articles = vec![
            article("https://example.com/1", "AI"),
            article("https://example.com/2", "AI"),
            article("https://example.com/1", "IT"),
            article("https://example.com/3", "IT"),
            article("https://example.com/2", "Space"),
        ];

        let unique = dedup_by_url(articles);
        let pairs: Vec<_> = unique
            .iter()
            .map(|a| (a.url.as_str(), a.topic.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("https://example.com/1", "AI"),
                ("https://example.com/2", "AI"),
                ("https://example.com/3", "IT"),
            ]
        );
    }

    #[test]
    fn dedup_is_idempotent() {
        let articles = vec![
            article("https://example.com/a", "x"),
            article("https://example.com/a", "y"),
            article("https://example.com/b", "y"),
        ];
        let once = dedup_by_url(articles);
        let twice = dedup_by_url(once.clone());
        assert_eq!(once, twice);
    }
}
