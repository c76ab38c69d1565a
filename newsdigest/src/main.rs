/*
newsdigest - main.rs
Terminal front end: one-shot digests, or an interactive chat session over stdin.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::init_db_pool;
use newsdigest::collector::Collector;
use newsdigest::delivery::{split_message, ChatSession, MESSAGE_LIMIT};
use newsdigest::digest::DigestGenerator;
use newsdigest::llm::remote::RemoteLlmProvider;
use newsdigest::llm::LlmProvider;
use newsdigest::pipeline::DigestPipeline;
use newsdigest::preferences::{ensure_schema, PreferenceDefaults, PreferencesStore};
use newsdigest::scraping::FetchSettings;
use newsdigest::search::{DuckDuckGoNews, SearchProvider};
use newsdigest::topics::ImportanceLevel;

#[derive(Parser, Debug)]
#[command(name = "newsdigest", about = "Personalized news digests from web search and an LLM")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce one digest for a user and print it
    Digest {
        #[arg(long)]
        user: i64,

        /// Keep only important stories at this strictness (low, medium, high)
        #[arg(long)]
        important: Option<ImportanceLevel>,
    },
    /// Interactive session: menu commands and free text on stdin
    Chat {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the digest
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config).await?;

    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };
    ensure_schema(&db_pool).await?;
    let store = Arc::new(PreferencesStore::new(db_pool, preference_defaults(&config)));

    let pipeline = Arc::new(build_pipeline(&config)?);

    match args.command {
        Command::Digest { user, important } => {
            let prefs = store.get_or_create(user).await?;
            if !prefs.has_topics() {
                println!("⚠️ No topics selected. Use `newsdigest chat --user {}` to pick some.", user);
                return Ok(());
            }
            let digest = pipeline.produce_digest(&prefs.digest_request(important)).await;
            store.touch_last_viewed(user).await?;
            print_messages(&split_message(&digest, MESSAGE_LIMIT));
        }
        Command::Chat { user } => run_chat(ChatSession::new(user, store, pipeline)).await?,
    }

    Ok(())
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(%e, "failed to load configuration");
        e
    })?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

fn preference_defaults(config: &Config) -> PreferenceDefaults {
    let defaults = config.defaults();
    let fallback = PreferenceDefaults::default();
    PreferenceDefaults {
        language_level: defaults
            .language_level
            .and_then(|l| l.parse().ok())
            .unwrap_or(fallback.language_level),
        reading_time: defaults.reading_time.unwrap_or(fallback.reading_time),
        digest_lang: defaults
            .digest_lang
            .and_then(|l| l.parse().ok())
            .unwrap_or(fallback.digest_lang),
    }
}

fn build_pipeline(config: &Config) -> Result<DigestPipeline> {
    let politeness = config.politeness();
    let digest = config.digest();

    let fetch_settings = FetchSettings {
        timeout_secs: politeness
            .fetch_timeout_seconds
            .unwrap_or(common::DEFAULT_FETCH_TIMEOUT_SECONDS),
        user_agent: politeness
            .user_agent
            .clone()
            .unwrap_or_else(|| common::DEFAULT_USER_AGENT.to_string()),
        max_connections: politeness
            .max_connections
            .unwrap_or(common::DEFAULT_MAX_CONNECTIONS),
        min_length: digest
            .min_article_length
            .unwrap_or(common::DEFAULT_MIN_ARTICLE_LENGTH),
        max_length: digest
            .max_article_length
            .unwrap_or(common::DEFAULT_MAX_ARTICLE_LENGTH),
    };

    let search = create_search_provider(config, &fetch_settings)?;
    let collector = Collector::new(
        search,
        fetch_settings,
        digest
            .max_results_per_topic
            .unwrap_or(common::DEFAULT_MAX_RESULTS_PER_TOPIC),
    );

    let remote = config
        .llm
        .as_ref()
        .and_then(|l| l.remote.clone())
        .unwrap_or_default();
    let generator = DigestGenerator::new(create_llm_provider(config)?)
        .with_words_per_minute(
            digest
                .words_per_minute
                .unwrap_or(common::DEFAULT_WORDS_PER_MINUTE),
        )
        .with_sampling(
            remote.max_tokens.unwrap_or(common::DEFAULT_LLM_MAX_TOKENS),
            remote.temperature.unwrap_or(common::DEFAULT_LLM_TEMPERATURE),
        );

    Ok(DigestPipeline::new(collector, generator))
}

fn create_search_provider(
    config: &Config,
    fetch_settings: &FetchSettings,
) -> Result<Arc<dyn SearchProvider>> {
    let search = config.search();
    let provider = search.provider.as_deref().unwrap_or("duckduckgo");
    match provider {
        "duckduckgo" => {
            let ddg = DuckDuckGoNews::new(
                search
                    .base_url
                    .unwrap_or_else(|| common::DEFAULT_SEARCH_BASE_URL.to_string()),
                search
                    .region
                    .unwrap_or_else(|| common::DEFAULT_SEARCH_REGION.to_string()),
                &fetch_settings.user_agent,
                fetch_settings.timeout_secs,
            )?;
            Ok(Arc::new(ddg))
        }
        other => anyhow::bail!("Unknown search provider: {}", other),
    }
}

/// Create the LLM provider based on configuration
fn create_llm_provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
    let adapter = config
        .llm
        .as_ref()
        .and_then(|l| l.adapter.as_deref())
        .unwrap_or("remote");

    match adapter {
        "remote" => {
            let remote = config
                .llm
                .as_ref()
                .and_then(|l| l.remote.clone())
                .unwrap_or_default();

            let api_key_env = remote
                .api_key_env
                .as_deref()
                .unwrap_or(common::DEFAULT_LLM_API_KEY_ENV);
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote
                .model
                .clone()
                .unwrap_or_else(|| common::DEFAULT_LLM_MODEL.to_string());
            let api_url = remote
                .api_url
                .clone()
                .unwrap_or_else(|| common::DEFAULT_LLM_API_URL.to_string());

            let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
                remote
                    .timeout_seconds
                    .unwrap_or(common::DEFAULT_LLM_TIMEOUT_SECONDS),
                remote.max_tokens.unwrap_or(common::DEFAULT_LLM_MAX_TOKENS),
                remote.temperature.unwrap_or(common::DEFAULT_LLM_TEMPERATURE),
            );
            info!(model = provider.model(), "LLM provider initialized");
            Ok(Arc::new(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

async fn run_chat(mut session: ChatSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_messages(&session.handle("/start").await?);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, leaving chat");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match session.handle(&line).await {
                    Ok(messages) => print_messages(&messages),
                    Err(e) => {
                        error!("chat: command failed: {:#}", e);
                        println!("❌ Something went wrong: {:#}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_messages(messages: &[String]) {
    for message in messages {
        println!("{}\n", message);
    }
}
