use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info};

use crate::llm::{LlmProvider, LlmRequest};
use crate::scraping::Article;
use crate::topics::{DigestLang, ImportanceLevel, LanguageLevel};

const SYSTEM_PROMPT: &str = "You are a professional news editor. \
Your digests are accurate, well structured and free of filler.";

/// Per-request knobs for a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigestOptions {
    pub language_level: LanguageLevel,
    pub reading_time: u32,
    pub digest_lang: DigestLang,
    pub important_only: bool,
    pub importance_level: ImportanceLevel,
}

/// Words the digest should roughly contain.
pub fn target_words(reading_time: u32, words_per_minute: u32) -> u32 {
    reading_time.saturating_mul(words_per_minute)
}

pub fn nothing_found_message(lang: DigestLang) -> &'static str {
    match lang {
        DigestLang::Ru => {
            "😕 Не удалось найти новости по выбранным темам. Попробуй позже или добавь больше тем."
        }
        DigestLang::En => {
            "😕 Couldn't find any news for your topics. Try again later or add more topics."
        }
    }
}

fn failure_message(lang: DigestLang, err: &anyhow::Error) -> String {
    match lang {
        DigestLang::Ru => format!("❌ Ошибка генерации дайджеста: {:#}", err),
        DigestLang::En => format!("❌ Failed to generate the digest: {:#}", err),
    }
}

/// Assemble the single instruction block sent to the model.
pub fn build_prompt(articles: &[Article], opts: &DigestOptions, words_per_minute: u32) -> String {
    let words = target_words(opts.reading_time, words_per_minute);
    let lang_instruction = match opts.digest_lang {
        DigestLang::Ru => "Respond in Russian.",
        DigestLang::En => "Respond in English.",
    };

    let mut prompt = String::new();
    prompt.push_str("You are a professional news editor. Your task is to write a structured news digest.\n\n");
    prompt.push_str("RULES:\n");
    prompt.push_str("1. Include ONLY confirmed facts. If something appears in a single source and looks doubtful, say so.\n");
    prompt.push_str("2. Remove all filler: opinions, speculation, clickbait, advertising.\n");
    prompt.push_str("3. Group the news by topic.\n");
    prompt.push_str("4. Each story: headline + the gist in 2-3 sentences + source (URL).\n");
    prompt.push_str("5. If several sources cover the same story, merge them and list every source.\n");

    if opts.important_only {
        let _ = write!(
            prompt,
            "\nIMPORTANT-ONLY MODE: {}\nSelect stories by their real significance and impact on the world or the industry.\n",
            opts.importance_level.directive()
        );
    }

    let _ = write!(
        prompt,
        "\nSTYLE: {}\nLANGUAGE: {}\nLENGTH: approximately {} words (about {} minutes of reading).\n",
        opts.language_level.style_directive(),
        lang_instruction,
        words,
        opts.reading_time
    );

    prompt.push_str("\nOUTPUT FORMAT (HTML tags, not Markdown):\n\n");
    prompt.push_str("<b>📌 TOPIC NAME</b>\n\n");
    prompt.push_str("▸ <b>Story headline</b>\n");
    prompt.push_str("Short description of what happened and why it matters.\n");
    prompt.push_str("🔗 <a href=\"URL\">Source</a>\n\n---\n\n");
    prompt.push_str("ARTICLES TO ANALYZE:\n");

    for (i, art) in articles.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n--- Article {} ---\nTopic: {}\nTitle: {}\nSource: {}\nURL: {}\nText: {}\n",
            i + 1,
            art.topic,
            art.title,
            art.domain,
            art.url,
            art.body
        );
    }

    prompt.push_str("\nWrite the digest:");
    prompt
}

/// Turns collected articles into a digest via the language model.
pub struct DigestGenerator {
    provider: Arc<dyn LlmProvider>,
    words_per_minute: u32,
    max_tokens: usize,
    temperature: f32,
}

impl DigestGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            words_per_minute: common::DEFAULT_WORDS_PER_MINUTE,
            max_tokens: common::DEFAULT_LLM_MAX_TOKENS,
            temperature: common::DEFAULT_LLM_TEMPERATURE,
        }
    }

    pub fn with_words_per_minute(mut self, words_per_minute: u32) -> Self {
        self.words_per_minute = words_per_minute;
        self
    }

    pub fn with_sampling(mut self, max_tokens: usize, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn words_per_minute(&self) -> u32 {
        self.words_per_minute
    }

    /// Generate the digest text. Never fails: errors become a user-facing message.
    pub async fn generate(&self, articles: &[Article], opts: &DigestOptions) -> String {
        if articles.is_empty() {
            info!("digest: no articles, skipping model call");
            return nothing_found_message(opts.digest_lang).to_string();
        }

        let prompt = build_prompt(articles, opts, self.words_per_minute);
        info!(
            articles = articles.len(),
            target_words = target_words(opts.reading_time, self.words_per_minute),
            important_only = opts.important_only,
            "digest: requesting completion"
        );

        let request = LlmRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            prompt,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            timeout_seconds: None,
        };

        match self.provider.generate(request).await {
            Ok(response) => {
                info!(
                    model = %response.model,
                    total_tokens = response.usage.total_tokens,
                    "digest: completion done"
                );
                response.content
            }
            Err(e) => {
                error!("digest: LLM call failed: {:#}", e);
                failure_message(opts.digest_lang, &e)
            }
        }
    }
}
