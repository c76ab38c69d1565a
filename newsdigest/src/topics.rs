//! Static catalogs: preset topics, language levels, reading times and
//! importance levels. Loaded once, never mutated at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reading times offered to users, in minutes.
pub const READING_TIMES: [u32; 5] = [3, 5, 7, 10, 15];

/// A catalog-listed subject with localized display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetTopic {
    pub id: &'static str,
    pub emoji: &'static str,
    pub name_ru: &'static str,
    pub name_en: &'static str,
}

impl PresetTopic {
    pub fn name(&self, lang: DigestLang) -> &'static str {
        match lang {
            DigestLang::Ru => self.name_ru,
            DigestLang::En => self.name_en,
        }
    }
}

const fn topic(
    id: &'static str,
    emoji: &'static str,
    name_ru: &'static str,
    name_en: &'static str,
) -> PresetTopic {
    PresetTopic { id, emoji, name_ru, name_en }
}

/// Preset topics in display order. Query building follows this order.
pub const PRESET_TOPICS: &[PresetTopic] = &[
    topic("geopolitics", "🌍", "Геополитика", "Geopolitics"),
    topic("economy", "💰", "Экономика", "Economy & Finance"),
    topic("it", "💻", "IT / Технологии", "IT & Tech"),
    topic("ai", "🤖", "AI / Нейросети", "AI & Neural Networks"),
    topic("science", "🔬", "Наука", "Science"),
    topic("space", "🚀", "Космос", "Space"),
    topic("gaming", "🎮", "Игры", "Gaming"),
    topic("3dprint", "🖨", "3D-печать", "3D Printing"),
    topic("gadgets", "📱", "Гаджеты", "Gadgets"),
    topic("energy", "⚡", "Энергетика", "Energy"),
    topic("medicine", "🏥", "Медицина", "Medicine"),
    topic("cybersecurity", "🔒", "Кибербезопасность", "Cybersecurity"),
    topic("crypto", "📈", "Крипто", "Crypto"),
    topic("auto", "🚗", "Авто / EV", "Auto & EV"),
    topic("cinema", "🎬", "Кино / Сериалы", "Cinema & TV"),
    topic("sport", "⚽", "Спорт", "Sport"),
    topic("russia", "🇷🇺", "Россия", "Russia"),
    topic("europe", "🇪🇺", "Европа", "Europe"),
    topic("usa", "🇺🇸", "США", "USA"),
    topic("china", "🇨🇳", "Китай", "China"),
];

pub fn find_topic(id: &str) -> Option<&'static PresetTopic> {
    PRESET_TOPICS.iter().find(|t| t.id == id)
}

/// Language of the generated digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestLang {
    #[default]
    Ru,
    En,
}

impl DigestLang {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestLang::Ru => "ru",
            DigestLang::En => "en",
        }
    }

    /// Word appended to search queries.
    pub fn news_suffix(&self) -> &'static str {
        match self {
            DigestLang::Ru => "новости",
            DigestLang::En => "news",
        }
    }
}

impl FromStr for DigestLang {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" => Ok(DigestLang::Ru),
            "en" => Ok(DigestLang::En),
            other => anyhow::bail!("unknown digest language: {}", other),
        }
    }
}

impl fmt::Display for DigestLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity of the digest prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageLevel {
    Simple,
    #[default]
    Medium,
    Advanced,
    Expert,
}

impl LanguageLevel {
    pub const ALL: [LanguageLevel; 4] = [
        LanguageLevel::Simple,
        LanguageLevel::Medium,
        LanguageLevel::Advanced,
        LanguageLevel::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLevel::Simple => "simple",
            LanguageLevel::Medium => "medium",
            LanguageLevel::Advanced => "advanced",
            LanguageLevel::Expert => "expert",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LanguageLevel::Simple => "😊",
            LanguageLevel::Medium => "📝",
            LanguageLevel::Advanced => "📊",
            LanguageLevel::Expert => "🎯",
        }
    }

    pub fn name(&self, lang: DigestLang) -> &'static str {
        match (self, lang) {
            (LanguageLevel::Simple, DigestLang::Ru) => "Простой",
            (LanguageLevel::Medium, DigestLang::Ru) => "Средний",
            (LanguageLevel::Advanced, DigestLang::Ru) => "Продвинутый",
            (LanguageLevel::Expert, DigestLang::Ru) => "Экспертный",
            (LanguageLevel::Simple, DigestLang::En) => "Simple",
            (LanguageLevel::Medium, DigestLang::En) => "Medium",
            (LanguageLevel::Advanced, DigestLang::En) => "Advanced",
            (LanguageLevel::Expert, DigestLang::En) => "Expert",
        }
    }

    /// Style directive embedded in the digest prompt.
    pub fn style_directive(&self) -> &'static str {
        match self {
            LanguageLevel::Simple => {
                "Explain it like you would to a friend: plain words, no jargon, short sentences."
            }
            LanguageLevel::Medium => {
                "Regular news style. Clear but informative."
            }
            LanguageLevel::Advanced => {
                "Use professional terminology and give more context and detail."
            }
            LanguageLevel::Expert => {
                "Maximum specifics: figures, dates, technical details, primary sources. No simplification."
            }
        }
    }
}

impl FromStr for LanguageLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(LanguageLevel::Simple),
            "medium" => Ok(LanguageLevel::Medium),
            "advanced" => Ok(LanguageLevel::Advanced),
            "expert" => Ok(LanguageLevel::Expert),
            other => anyhow::bail!("unknown language level: {}", other),
        }
    }
}

impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strictness of the "important only" filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl ImportanceLevel {
    /// Inclusive band of items the model should keep.
    pub fn item_band(&self) -> (u32, u32) {
        match self {
            ImportanceLevel::Low => (10, 15),
            ImportanceLevel::Medium => (5, 7),
            ImportanceLevel::High => (3, 5),
        }
    }

    pub fn directive(&self) -> String {
        let (lo, hi) = self.item_band();
        match self {
            ImportanceLevel::Low => {
                format!("Include every reasonably significant story ({}-{} items).", lo, hi)
            }
            ImportanceLevel::Medium => {
                format!("Pick only the genuinely important stories ({}-{} items).", lo, hi)
            }
            ImportanceLevel::High => {
                format!("Only the most critical, top stories of the day ({}-{} items).", lo, hi)
            }
        }
    }
}

impl FromStr for ImportanceLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(ImportanceLevel::Low),
            "medium" => Ok(ImportanceLevel::Medium),
            "high" => Ok(ImportanceLevel::High),
            other => anyhow::bail!("unknown importance level: {}", other),
        }
    }
}

impl fmt::Display for ImportanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportanceLevel::Low => "low",
            ImportanceLevel::Medium => "medium",
            ImportanceLevel::High => "high",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique() {
        let ids: HashSet<_> = PRESET_TOPICS.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), PRESET_TOPICS.len());
    }

    #[test]
    fn localized_topic_names() {
        let ai = find_topic("ai").expect("ai topic");
        assert_eq!(ai.name(DigestLang::Ru), "AI / Нейросети");
        assert_eq!(ai.name(DigestLang::En), "AI & Neural Networks");
        assert!(find_topic("knitting").is_none());
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("EN".parse::<DigestLang>().unwrap(), DigestLang::En);
        assert_eq!("Expert".parse::<LanguageLevel>().unwrap(), LanguageLevel::Expert);
        assert_eq!("high".parse::<ImportanceLevel>().unwrap(), ImportanceLevel::High);
        assert!("de".parse::<DigestLang>().is_err());
    }

    #[test]
    fn importance_bands() {
        assert_eq!(ImportanceLevel::Low.item_band(), (10, 15));
        assert_eq!(ImportanceLevel::Medium.item_band(), (5, 7));
        assert!(ImportanceLevel::High.directive().contains("3-5"));
    }
}
