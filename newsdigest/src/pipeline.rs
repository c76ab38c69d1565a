use tracing::{debug, info};

use crate::collector::Collector;
use crate::digest::{DigestGenerator, DigestOptions};
use crate::search::parse_timestamp;

/// Everything one digest run needs, taken from a preferences snapshot.
#[derive(Debug, Clone, Default)]
pub struct DigestRequest {
    pub enabled_topics: Vec<String>,
    pub custom_topics: Vec<String>,
    pub options: DigestOptions,
    /// Raw last-viewed timestamp; unparseable values mean "no cutoff".
    pub last_viewed_at: Option<String>,
}

/// Collect, then summarize. Holds no per-run state, so one instance serves
/// concurrent requests for different users.
pub struct DigestPipeline {
    collector: Collector,
    generator: DigestGenerator,
}

impl DigestPipeline {
    pub fn new(collector: Collector, generator: DigestGenerator) -> Self {
        Self {
            collector,
            generator,
        }
    }

    pub async fn produce_digest(&self, request: &DigestRequest) -> String {
        let since = request.last_viewed_at.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                debug!(raw, "pipeline: ignoring unparseable last-viewed timestamp");
            }
            parsed
        });

        let articles = self
            .collector
            .collect_all_news(
                &request.enabled_topics,
                &request.custom_topics,
                request.options.digest_lang,
                since,
            )
            .await;

        info!(articles = articles.len(), "pipeline: articles collected");
        self.generator.generate(&articles, &request.options).await
    }
}
