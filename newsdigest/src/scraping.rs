use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::topics::DigestLang;

/// A scraped article ready to be handed to the digest prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Cleaned body text, at most `max_length` characters.
    pub body: String,
    pub url: String,
    pub domain: String,
    /// Label of the topic whose search found this article.
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_connections: usize,
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: common::DEFAULT_FETCH_TIMEOUT_SECONDS,
            user_agent: common::DEFAULT_USER_AGENT.to_string(),
            max_connections: common::DEFAULT_MAX_CONNECTIONS,
            min_length: common::DEFAULT_MIN_ARTICLE_LENGTH,
            max_length: common::DEFAULT_MAX_ARTICLE_LENGTH,
        }
    }
}

/// Downloads and cleans article pages.
///
/// One fetcher is built per digest run; its client and connection permits are
/// released when the run drops it.
pub struct ArticleFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    settings: FetchSettings,
    untitled: &'static str,
}

impl ArticleFetcher {
    pub fn new(settings: FetchSettings, lang: DigestLang) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .pool_max_idle_per_host(settings.max_connections)
            .build()
            .context("failed to build reqwest client")?;

        let untitled = match lang {
            DigestLang::Ru => "Без заголовка",
            DigestLang::En => "Untitled",
        };

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.max_connections.max(1))),
            settings,
            untitled,
        })
    }

    /// Fetch and extract one article. Any failure yields `None`.
    pub async fn fetch(&self, url: &str, topic: &str) -> Option<Article> {
        match self.try_fetch(url, topic).await {
            Ok(article) => article,
            Err(e) => {
                debug!(url, "scraping: fetch failed: {:#}", e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str, topic: &str) -> Result<Option<Article>> {
        let html = {
            let _permit = self
                .permits
                .acquire()
                .await
                .context("connection permits closed")?;

            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("failed to fetch article page")?;

            let status = response.status();
            if !status.is_success() {
                debug!(url, %status, "scraping: non-success status");
                return Ok(None);
            }

            response.text().await.context("failed to read response body")?
        };

        let url_obj = url::Url::parse(url).context("failed to parse article URL")?;
        let page = extract_page(&html, &url_obj, self.settings.min_length);

        let text = page.text.trim();
        let length = text.chars().count();
        if length < self.settings.min_length {
            debug!(url, length, "scraping: body too short, not an article");
            return Ok(None);
        }

        info!(url, length, "scraping: extracted article");

        let title = page.title.trim();
        Ok(Some(Article {
            title: if title.is_empty() {
                self.untitled.to_string()
            } else {
                title.to_string()
            },
            body: text.chars().take(self.settings.max_length).collect(),
            url: url.to_string(),
            domain: domain_of(url),
            topic: topic.to_string(),
        }))
    }
}

#[derive(Debug, Default)]
struct ExtractedPage {
    title: String,
    text: String,
}

/// Readability first; if that fails or comes up short, fall back to common
/// content containers and finally to every paragraph on the page.
fn extract_page(html: &str, url: &url::Url, min_length: usize) -> ExtractedPage {
    let mut page = ExtractedPage::default();

    let mut reader = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut reader, url) {
        Ok(product) => {
            page.title = product.title;
            page.text = match html2text::from_read(product.content.as_bytes(), 80) {
                Ok(text) => text,
                Err(e) => {
                    debug!("scraping: html2text failed on readability output: {}", e);
                    product.text
                }
            };
        }
        Err(e) => debug!(%url, "scraping: readability failed: {}", e),
    }

    if page.text.trim().chars().count() < min_length || page.title.trim().is_empty() {
        let document = Html::parse_document(html);
        if page.text.trim().chars().count() < min_length {
            if let Some(text) = fallback_text(&document, min_length) {
                page.text = text;
            }
        }
        if page.title.trim().is_empty() {
            page.title = document_title(&document).unwrap_or_default();
        }
    }

    page
}

fn fallback_text(document: &Html, min_length: usize) -> Option<String> {
    let containers = ["article", "main", ".post-content", ".entry-content", "#content"];

    for selector_str in containers {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            if let Ok(text) = html2text::from_read(element.html().as_bytes(), 80) {
                if text.trim().chars().count() >= min_length {
                    return Some(text);
                }
            }
        }
    }

    let paragraphs = Selector::parse("p").ok()?;
    let text = document
        .select(&paragraphs)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    (!text.is_empty()).then_some(text)
}

fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
}

/// Host of the URL, or the third `/`-separated segment for unparseable input.
pub fn domain_of(url: &str) -> String {
    if let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
    {
        return host;
    }
    url.split('/').nth(2).unwrap_or(url).to_string()
}
