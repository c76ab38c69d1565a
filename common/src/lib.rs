/*!
common/src/lib.rs

Shared configuration types and DB helper functions for newsdigest.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override
- A helper to initialize the SQLite pool backing the preferences store
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_LLM_API_URL: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_LLM_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
pub const DEFAULT_LLM_MAX_TOKENS: usize = 4000;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 120;

pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://duckduckgo.com";
pub const DEFAULT_SEARCH_REGION: &str = "wt-wt";

pub const DEFAULT_MAX_RESULTS_PER_TOPIC: usize = 5;
pub const DEFAULT_MAX_ARTICLE_LENGTH: usize = 3000;
pub const DEFAULT_MIN_ARTICLE_LENGTH: usize = 100;
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsdigest.db")
    pub path: String,
}

/// Politeness / fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolitenessConfig {
    pub fetch_timeout_seconds: Option<u64>,
    /// Upper bound on simultaneous connections within one digest run
    pub max_connections: Option<usize>,
    pub user_agent: Option<String>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// LLM top-level config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote"
    pub remote: Option<RemoteLlmConfig>,
}

/// Web search provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub provider: Option<String>, // "duckduckgo"
    pub base_url: Option<String>,
    pub region: Option<String>,
}

/// Collection and prompt sizing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    pub max_results_per_topic: Option<usize>,
    pub max_article_length: Option<usize>,
    pub min_article_length: Option<usize>,
    pub words_per_minute: Option<u32>,
}

/// Preference values given to users seen for the first time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub language_level: Option<String>,
    pub reading_time: Option<u32>,
    pub digest_lang: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: Option<LlmConfig>,
    pub politeness: Option<PolitenessConfig>,
    pub search: Option<SearchConfig>,
    pub digest: Option<DigestConfig>,
    pub defaults: Option<DefaultsConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    pub fn politeness(&self) -> PolitenessConfig {
        self.politeness.clone().unwrap_or_default()
    }

    pub fn search(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    pub fn digest(&self) -> DigestConfig {
        self.digest.clone().unwrap_or_default()
    }

    pub fn defaults(&self) -> DefaultsConfig {
        self.defaults.clone().unwrap_or_default()
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory if necessary and returns a small WAL-mode pool.
/// The preferences store only issues short single-row statements, so a handful
/// of connections is plenty.
///
/// Example:
///   let pool = init_db_pool("data/newsdigest.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
