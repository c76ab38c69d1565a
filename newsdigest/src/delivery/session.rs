use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use super::{split_message, MESSAGE_LIMIT};
use crate::pipeline::DigestPipeline;
use crate::preferences::{CustomTopicError, PreferencesStore, MAX_CUSTOM_TOPICS};
use crate::topics::{
    find_topic, DigestLang, ImportanceLevel, LanguageLevel, PRESET_TOPICS, READING_TIMES,
};

/// What the next free-text message from the user means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingCustomTopic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Menu,
    News,
    Important(Option<String>),
    Settings,
    Topics,
    Toggle(String),
    AllOn,
    AllOff,
    Custom,
    Add,
    Delete(String),
    Level(String),
    Time(String),
    Lang(String),
    ResetHistory,
    Cancel,
    Unknown(String),
}

impl Command {
    fn parse(input: &str) -> Option<Command> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default().to_lowercase();
        let arg = words.collect::<Vec<_>>().join(" ");
        let arg_opt = (!arg.is_empty()).then(|| arg.clone());

        Some(match name.as_str() {
            "start" | "menu" => Command::Menu,
            "news" => Command::News,
            "important" => Command::Important(arg_opt),
            "settings" => Command::Settings,
            "topics" => Command::Topics,
            "toggle" => Command::Toggle(arg),
            "all_on" => Command::AllOn,
            "all_off" => Command::AllOff,
            "custom" => Command::Custom,
            "add" => Command::Add,
            "del" => Command::Delete(arg),
            "level" => Command::Level(arg),
            "time" => Command::Time(arg),
            "lang" => Command::Lang(arg),
            "reset_history" => Command::ResetHistory,
            "cancel" => Command::Cancel,
            _ => Command::Unknown(name),
        })
    }
}

/// One user's conversation with the bot. State lives here, not in a global.
pub struct ChatSession {
    user_id: i64,
    state: SessionState,
    store: Arc<PreferencesStore>,
    pipeline: Arc<DigestPipeline>,
}

impl ChatSession {
    pub fn new(user_id: i64, store: Arc<PreferencesStore>, pipeline: Arc<DigestPipeline>) -> Self {
        Self {
            user_id,
            state: SessionState::Idle,
            store,
            pipeline,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one line of input and return the messages to render, in order.
    pub async fn handle(&mut self, input: &str) -> Result<Vec<String>> {
        let Some(command) = Command::parse(input) else {
            return self.handle_text(input).await;
        };

        self.state = if matches!(command, Command::Add) {
            SessionState::AwaitingCustomTopic
        } else {
            SessionState::Idle
        };

        match command {
            Command::Menu => {
                self.store.ensure_user(self.user_id).await?;
                Ok(vec![main_menu()])
            }
            Command::News => self.run_digest(None).await,
            Command::Important(None) => Ok(vec![importance_menu()]),
            Command::Important(Some(level)) => match level.parse::<ImportanceLevel>() {
                Ok(level) => self.run_digest(Some(level)).await,
                Err(_) => Ok(vec![importance_menu()]),
            },
            Command::Settings => self.settings().await,
            Command::Topics => self.topics().await,
            Command::Toggle(id) => {
                if find_topic(&id).is_none() {
                    return Ok(vec![format!("⚠️ Unknown topic \"{}\". See /topics.", id)]);
                }
                if self.store.toggle_topic(self.user_id, &id).await? {
                    Ok(vec![format!("✅ {} enabled", id)])
                } else {
                    Ok(vec![format!("▫️ {} disabled", id)])
                }
            }
            Command::AllOn => {
                let all: Vec<String> = PRESET_TOPICS.iter().map(|t| t.id.to_string()).collect();
                self.store.set_enabled_topics(self.user_id, &all).await?;
                Ok(vec!["✅ All topics enabled".to_string()])
            }
            Command::AllOff => {
                self.store.set_enabled_topics(self.user_id, &[]).await?;
                Ok(vec!["▫️ All topics disabled".to_string()])
            }
            Command::Custom => self.custom_topics().await,
            Command::Add => Ok(vec![format!(
                "✏️ Send the topic name (up to 100 characters, {} topics max). /cancel to abort.",
                MAX_CUSTOM_TOPICS
            )]),
            Command::Delete(arg) => self.delete_custom(&arg).await,
            Command::Level(arg) => match arg.parse::<LanguageLevel>() {
                Ok(level) => {
                    self.store.set_language_level(self.user_id, level).await?;
                    Ok(vec![format!("{} Language level: {}", level.emoji(), level)])
                }
                Err(_) => {
                    let levels: Vec<&str> = LanguageLevel::ALL.iter().map(|l| l.as_str()).collect();
                    Ok(vec![format!("⚠️ Use /level {}", levels.join("|"))])
                }
            },
            Command::Time(arg) => match arg.parse::<u32>() {
                Ok(minutes) if READING_TIMES.contains(&minutes) => {
                    self.store.set_reading_time(self.user_id, minutes).await?;
                    Ok(vec![format!("⏱ Reading time: {} min", minutes)])
                }
                _ => Ok(vec![format!("⚠️ Reading time must be one of {:?}", READING_TIMES)]),
            },
            Command::Lang(arg) => match arg.parse::<DigestLang>() {
                Ok(lang) => {
                    self.store.set_digest_lang(self.user_id, lang).await?;
                    Ok(vec![format!("🌐 Digest language: {}", lang)])
                }
                Err(_) => Ok(vec!["⚠️ Use /lang ru|en".to_string()]),
            },
            Command::ResetHistory => {
                self.store.clear_last_viewed(self.user_id).await?;
                Ok(vec!["🔄 History reset: the next digest covers everything.".to_string()])
            }
            Command::Cancel => Ok(vec!["❌ Cancelled".to_string(), main_menu()]),
            Command::Unknown(name) => Ok(vec![format!("Unknown command /{}", name), main_menu()]),
        }
    }

    async fn handle_text(&mut self, input: &str) -> Result<Vec<String>> {
        if self.state != SessionState::AwaitingCustomTopic {
            return Ok(vec!["Use the menu commands 👇".to_string(), main_menu()]);
        }
        self.state = SessionState::Idle;

        let reply = match self.store.add_custom_topic(self.user_id, input).await? {
            Ok(topic) => format!("✅ Topic «{}» added!", topic),
            Err(CustomTopicError::Duplicate(_)) => "⚠️ That topic already exists!".to_string(),
            Err(CustomTopicError::LimitReached { max }) => {
                format!("⚠️ At most {} custom topics. Delete one first.", max)
            }
            Err(CustomTopicError::TooLong { max }) => {
                format!("⚠️ Name too long. Maximum {} characters.", max)
            }
            Err(CustomTopicError::Empty) => "⚠️ Empty topic, nothing added.".to_string(),
        };
        Ok(vec![reply])
    }

    async fn run_digest(&mut self, importance: Option<ImportanceLevel>) -> Result<Vec<String>> {
        let prefs = self.store.get_or_create(self.user_id).await?;
        if !prefs.has_topics() {
            return Ok(vec!["⚠️ Pick some topics first: /topics or /add".to_string()]);
        }

        let mut status = String::from("⏳ Collecting news...");
        if let Some(last) = &prefs.last_viewed_at {
            let _ = write!(status, "\n📅 Last viewed: {}. Looking for fresh stories only.", last);
        }

        info!(user_id = self.user_id, ?importance, "session: digest requested");
        let digest = self
            .pipeline
            .produce_digest(&prefs.digest_request(importance))
            .await;
        self.store.touch_last_viewed(self.user_id).await?;

        let mut messages = vec![status];
        messages.extend(split_message(&digest, MESSAGE_LIMIT));
        Ok(messages)
    }

    async fn settings(&self) -> Result<Vec<String>> {
        let prefs = self.store.get_or_create(self.user_id).await?;
        let topics = prefs.enabled_topics.len() + prefs.custom_topics.len();
        Ok(vec![format!(
            "⚙️ Settings\n\n📋 Topics: {}\n{} Language level: {}\n⏱ Reading time: {} min\n🌐 Digest language: {}\n📅 Last viewed: {}",
            topics,
            prefs.language_level.emoji(),
            prefs.language_level.name(DigestLang::En),
            prefs.reading_time,
            prefs.digest_lang,
            prefs.last_viewed_at.as_deref().unwrap_or("never"),
        )])
    }

    async fn topics(&self) -> Result<Vec<String>> {
        let prefs = self.store.get_or_create(self.user_id).await?;
        let mut text = String::from("📋 Topics (/toggle <id>, /all_on, /all_off)\n");
        for t in PRESET_TOPICS {
            let mark = if prefs.enabled_topics.iter().any(|id| id == t.id) {
                "✅"
            } else {
                "▫️"
            };
            let _ = write!(text, "\n{} {} {} ({})", mark, t.emoji, t.name(prefs.digest_lang), t.id);
        }
        Ok(vec![text])
    }

    async fn custom_topics(&self) -> Result<Vec<String>> {
        let prefs = self.store.get_or_create(self.user_id).await?;
        if prefs.custom_topics.is_empty() {
            return Ok(vec!["✏️ No custom topics yet. /add to create one.".to_string()]);
        }
        let mut text = String::from("✏️ Custom topics (/del <n> to remove)\n");
        for (i, topic) in prefs.custom_topics.iter().enumerate() {
            let _ = write!(text, "\n{}. {}", i + 1, topic);
        }
        Ok(vec![text])
    }

    async fn delete_custom(&self, arg: &str) -> Result<Vec<String>> {
        let index = match arg.parse::<usize>() {
            Ok(n) if n >= 1 => n - 1,
            _ => return Ok(vec!["⚠️ Use /del <number> from /custom".to_string()]),
        };
        match self.store.remove_custom_topic(self.user_id, index).await? {
            Some(removed) => Ok(vec![format!("🗑 «{}» removed", removed)]),
            None => Ok(vec!["⚠️ No custom topic with that number".to_string()]),
        }
    }
}

fn main_menu() -> String {
    [
        "📰 News digest",
        "",
        "/news — digest for your topics",
        "/important [low|medium|high] — only the important stories",
        "/settings — current settings",
        "/topics, /toggle <id>, /all_on, /all_off — preset topics",
        "/custom, /add, /del <n> — custom topics",
        "/level <simple|medium|advanced|expert> — language level",
        "/time <3|5|7|10|15> — reading time",
        "/lang <ru|en> — digest language",
        "/reset_history — forget the last viewed time",
    ]
    .join("\n")
}

fn importance_menu() -> String {
    [
        "🔥 Important only: choose how strict",
        "",
        "/important low — 10-15 notable stories",
        "/important medium — 5-7 genuinely important stories",
        "/important high — 3-5 top stories of the day",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(Command::parse("/news"), Some(Command::News));
        assert_eq!(Command::parse("  /MENU "), Some(Command::Menu));
        assert_eq!(
            Command::parse("/important high"),
            Some(Command::Important(Some("high".to_string())))
        );
        assert_eq!(Command::parse("/important"), Some(Command::Important(None)));
        assert_eq!(Command::parse("/toggle ai"), Some(Command::Toggle("ai".to_string())));
        assert_eq!(Command::parse("/frobnicate"), Some(Command::Unknown("frobnicate".to_string())));
        assert_eq!(Command::parse("Formula 1"), None);
    }
}
