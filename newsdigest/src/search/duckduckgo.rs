use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use super::{SearchProvider, SearchResult};

/// DuckDuckGo news search.
///
/// Two requests per query: the front page hands out a `vqd` token, which the
/// `news.js` endpoint requires alongside the query.
pub struct DuckDuckGoNews {
    base_url: String,
    region: String,
    client: Client,
}

impl DuckDuckGoNews {
    pub fn new(
        base_url: impl Into<String>,
        region: impl Into<String>,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region: region.into(),
            client,
        })
    }

    async fn vqd_token(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("q", query)])
            .send()
            .await
            .context("failed to fetch search token page")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("search token request failed with status: {}", status);
        }

        let body = response.text().await.context("failed to read token page")?;
        extract_vqd(&body).context("no vqd token in search page")
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoNews {
    async fn news(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let vqd = self.vqd_token(query).await?;

        let response = self
            .client
            .get(format!("{}/news.js", self.base_url))
            .query(&[
                ("l", self.region.as_str()),
                ("o", "json"),
                ("noamp", "1"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("p", "-1"),
            ])
            .send()
            .await
            .context("failed to fetch news results")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("news search failed with status: {}", status);
        }

        let body: NewsResponse = response
            .json()
            .await
            .context("failed to parse news results")?;

        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .filter_map(|item| {
                let url = item.url.or(item.href).filter(|u| !u.is_empty())?;
                Some(SearchResult {
                    title: item.title.unwrap_or_default(),
                    url,
                    date: item.date.map(format_epoch).unwrap_or_default(),
                    label: query.to_string(),
                })
            })
            .take(max_results)
            .collect();

        debug!(query, count = results.len(), "duckduckgo: news results");
        Ok(results)
    }
}

fn extract_vqd(body: &str) -> Option<String> {
    static VQD: OnceLock<Regex> = OnceLock::new();
    let re = VQD.get_or_init(|| Regex::new(r#"vqd=["']?([0-9-]+)"#).expect("valid vqd regex"));
    re.captures(body).map(|c| c[1].to_string())
}

fn format_epoch(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    title: Option<String>,
    url: Option<String>,
    href: Option<String>,
    date: Option<i64>,
}
