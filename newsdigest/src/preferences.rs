use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

use crate::digest::DigestOptions;
use crate::pipeline::DigestRequest;
use crate::topics::{find_topic, DigestLang, ImportanceLevel, LanguageLevel, READING_TIMES};

pub const MAX_CUSTOM_TOPICS: usize = 20;
pub const MAX_CUSTOM_TOPIC_CHARS: usize = 100;

/// Snapshot of one user's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreferences {
    pub user_id: i64,
    pub enabled_topics: Vec<String>,
    pub custom_topics: Vec<String>,
    pub language_level: LanguageLevel,
    pub reading_time: u32,
    pub digest_lang: DigestLang,
    pub last_viewed_at: Option<String>,
}

impl UserPreferences {
    pub fn has_topics(&self) -> bool {
        !self.enabled_topics.is_empty() || !self.custom_topics.is_empty()
    }

    pub fn digest_request(&self, importance: Option<ImportanceLevel>) -> DigestRequest {
        DigestRequest {
            enabled_topics: self.enabled_topics.clone(),
            custom_topics: self.custom_topics.clone(),
            options: DigestOptions {
                language_level: self.language_level,
                reading_time: self.reading_time,
                digest_lang: self.digest_lang,
                important_only: importance.is_some(),
                importance_level: importance.unwrap_or_default(),
            },
            last_viewed_at: self.last_viewed_at.clone(),
        }
    }
}

/// Why a custom topic was not added. The stored list is left untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomTopicError {
    #[error("topic is empty")]
    Empty,
    #[error("topic is longer than {max} characters")]
    TooLong { max: usize },
    #[error("at most {max} custom topics can be stored")]
    LimitReached { max: usize },
    #[error("topic \"{0}\" already exists")]
    Duplicate(String),
}

/// Check a candidate custom topic against the stored list and return it trimmed.
pub fn validate_custom_topic(existing: &[String], candidate: &str) -> Result<String, CustomTopicError> {
    let topic = candidate.trim();
    if topic.is_empty() {
        return Err(CustomTopicError::Empty);
    }
    if topic.chars().count() > MAX_CUSTOM_TOPIC_CHARS {
        return Err(CustomTopicError::TooLong {
            max: MAX_CUSTOM_TOPIC_CHARS,
        });
    }
    if existing.len() >= MAX_CUSTOM_TOPICS {
        return Err(CustomTopicError::LimitReached {
            max: MAX_CUSTOM_TOPICS,
        });
    }
    let lowered = topic.to_lowercase();
    if let Some(dup) = existing.iter().find(|t| t.to_lowercase() == lowered) {
        return Err(CustomTopicError::Duplicate(dup.clone()));
    }
    Ok(topic.to_string())
}

/// Values for users seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceDefaults {
    pub language_level: LanguageLevel,
    pub reading_time: u32,
    pub digest_lang: DigestLang,
}

impl Default for PreferenceDefaults {
    fn default() -> Self {
        Self {
            language_level: LanguageLevel::Medium,
            reading_time: 7,
            digest_lang: DigestLang::Ru,
        }
    }
}

/// Create the `users` table if it does not exist yet.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            enabled_topics TEXT NOT NULL DEFAULT '[]',
            custom_topics TEXT NOT NULL DEFAULT '[]',
            language_level TEXT NOT NULL DEFAULT 'medium',
            reading_time INTEGER NOT NULL DEFAULT 7,
            digest_lang TEXT NOT NULL DEFAULT 'ru',
            last_viewed_at TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create users table")?;
    Ok(())
}

/// SQLite-backed per-user preferences.
pub struct PreferencesStore {
    pool: SqlitePool,
    defaults: PreferenceDefaults,
}

impl PreferencesStore {
    pub fn new(pool: SqlitePool, defaults: PreferenceDefaults) -> Self {
        Self { pool, defaults }
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, enabled_topics, custom_topics, language_level,
                   reading_time, digest_lang, last_viewed_at
            FROM users WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch user preferences")?;

        Ok(row.map(|row| {
            let enabled: String = row.get("enabled_topics");
            let custom: String = row.get("custom_topics");
            let level: String = row.get("language_level");
            let lang: String = row.get("digest_lang");
            let reading_time: i64 = row.get("reading_time");

            UserPreferences {
                user_id: row.get("user_id"),
                enabled_topics: decode_list(&enabled),
                custom_topics: decode_list(&custom),
                language_level: level.parse().unwrap_or_else(|_| {
                    warn!(user_id, %level, "preferences: unknown language level, using default");
                    self.defaults.language_level
                }),
                reading_time: u32::try_from(reading_time).unwrap_or(self.defaults.reading_time),
                digest_lang: lang.parse().unwrap_or(self.defaults.digest_lang),
                last_viewed_at: row.get("last_viewed_at"),
            }
        }))
    }

    pub async fn get_or_create(&self, user_id: i64) -> Result<UserPreferences> {
        if let Some(prefs) = self.get(user_id).await? {
            return Ok(prefs);
        }

        sqlx::query(
            "INSERT OR IGNORE INTO users (user_id, language_level, reading_time, digest_lang) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(self.defaults.language_level.as_str())
        .bind(i64::from(self.defaults.reading_time))
        .bind(self.defaults.digest_lang.as_str())
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;
        info!(user_id, "preferences: created user");

        self.get(user_id)
            .await?
            .context("user row missing right after insert")
    }

    pub async fn set_enabled_topics(&self, user_id: i64, topics: &[String]) -> Result<()> {
        self.update_json(user_id, "enabled_topics", topics).await
    }

    /// Flip one preset topic on or off. Returns whether it is now enabled.
    pub async fn toggle_topic(&self, user_id: i64, topic_id: &str) -> Result<bool> {
        if find_topic(topic_id).is_none() {
            anyhow::bail!("unknown topic: {}", topic_id);
        }
        let mut topics = self.get_or_create(user_id).await?.enabled_topics;
        let enabled = if let Some(pos) = topics.iter().position(|t| t == topic_id) {
            topics.remove(pos);
            false
        } else {
            topics.push(topic_id.to_string());
            true
        };
        self.set_enabled_topics(user_id, &topics).await?;
        Ok(enabled)
    }

    pub async fn set_custom_topics(&self, user_id: i64, topics: &[String]) -> Result<()> {
        self.update_json(user_id, "custom_topics", topics).await
    }

    /// Append a custom topic. The inner result carries validation rejections.
    pub async fn add_custom_topic(
        &self,
        user_id: i64,
        candidate: &str,
    ) -> Result<std::result::Result<String, CustomTopicError>> {
        let mut topics = self.get_or_create(user_id).await?.custom_topics;
        let topic = match validate_custom_topic(&topics, candidate) {
            Ok(topic) => topic,
            Err(rejection) => return Ok(Err(rejection)),
        };
        topics.push(topic.clone());
        self.set_custom_topics(user_id, &topics).await?;
        Ok(Ok(topic))
    }

    /// Remove the custom topic at `index`. Out-of-range is a no-op returning `None`.
    pub async fn remove_custom_topic(&self, user_id: i64, index: usize) -> Result<Option<String>> {
        let mut topics = self.get_or_create(user_id).await?.custom_topics;
        if index >= topics.len() {
            return Ok(None);
        }
        let removed = topics.remove(index);
        self.set_custom_topics(user_id, &topics).await?;
        Ok(Some(removed))
    }

    pub async fn set_language_level(&self, user_id: i64, level: LanguageLevel) -> Result<()> {
        self.update_text(user_id, "language_level", level.as_str()).await
    }

    pub async fn set_reading_time(&self, user_id: i64, minutes: u32) -> Result<()> {
        if !READING_TIMES.contains(&minutes) {
            anyhow::bail!("reading time must be one of {:?} minutes", READING_TIMES);
        }
        self.ensure_user(user_id).await?;
        sqlx::query("UPDATE users SET reading_time = ? WHERE user_id = ?")
            .bind(i64::from(minutes))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to update reading_time")?;
        Ok(())
    }

    pub async fn set_digest_lang(&self, user_id: i64, lang: DigestLang) -> Result<()> {
        self.update_text(user_id, "digest_lang", lang.as_str()).await
    }

    pub async fn touch_last_viewed(&self, user_id: i64) -> Result<()> {
        self.ensure_user(user_id).await?;
        sqlx::query("UPDATE users SET last_viewed_at = ? WHERE user_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to update last_viewed_at")?;
        Ok(())
    }

    pub async fn clear_last_viewed(&self, user_id: i64) -> Result<()> {
        self.ensure_user(user_id).await?;
        sqlx::query("UPDATE users SET last_viewed_at = NULL WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to reset last_viewed_at")?;
        Ok(())
    }

    async fn update_json(&self, user_id: i64, column: &'static str, values: &[String]) -> Result<()> {
        let json = serde_json::to_string(values).context("failed to serialize topic list")?;
        self.update_text(user_id, column, &json).await
    }

    /// Insert the default row for `user_id` if there is none, so updates land.
    pub async fn ensure_user(&self, user_id: i64) -> Result<()> {
        self.get_or_create(user_id).await.map(|_| ())
    }

    // `column` is always one of our own literals, never user input.
    async fn update_text(&self, user_id: i64, column: &'static str, value: &str) -> Result<()> {
        self.ensure_user(user_id).await?;
        sqlx::query(&format!("UPDATE users SET {} = ? WHERE user_id = ?", column))
            .bind(value)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update {}", column))?;
        Ok(())
    }
}

fn decode_list(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("preferences: malformed topic list {:?}: {}", json, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("topic {}", i)).collect()
    }

    #[test]
    fn accepts_and_trims_new_topic() {
        assert_eq!(
            validate_custom_topic(&topics(2), "  Rust language  "),
            Ok("Rust language".to_string())
        );
    }

    #[test]
    fn rejects_case_insensitive_duplicate() {
        let existing = vec!["Formula 1".to_string()];
        assert_eq!(
            validate_custom_topic(&existing, "formula 1"),
            Err(CustomTopicError::Duplicate("Formula 1".to_string()))
        );
    }

    #[test]
    fn rejects_over_long_topic() {
        let long = "я".repeat(MAX_CUSTOM_TOPIC_CHARS + 1);
        assert_eq!(
            validate_custom_topic(&[], &long),
            Err(CustomTopicError::TooLong { max: 100 })
        );
        // exactly at the limit is fine, counted in characters not bytes
        let edge = "я".repeat(MAX_CUSTOM_TOPIC_CHARS);
        assert!(validate_custom_topic(&[], &edge).is_ok());
    }

    #[test]
    fn rejects_past_limit() {
        assert_eq!(
            validate_custom_topic(&topics(MAX_CUSTOM_TOPICS), "one more"),
            Err(CustomTopicError::LimitReached { max: 20 })
        );
        assert!(validate_custom_topic(&topics(MAX_CUSTOM_TOPICS - 1), "one more").is_ok());
    }

    #[test]
    fn rejects_blank_topic() {
        assert_eq!(validate_custom_topic(&[], "   "), Err(CustomTopicError::Empty));
    }
}
