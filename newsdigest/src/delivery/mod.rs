//! Terminal delivery channel: message splitting and the per-user chat session.

pub mod session;

pub use session::{ChatSession, SessionState};

/// Transport limit for a single rendered message, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

/// Split `text` into chunks of at most `limit` characters, breaking only at
/// newlines. Joining the chunks with `'\n'` gives back the original text.
///
/// A single line longer than `limit` cannot satisfy both rules; it is cut on
/// character boundaries into chunks of its own.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current: Option<String> = None;
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();

        if line_len > limit {
            parts.extend(current.take());
            let chars: Vec<char> = line.chars().collect();
            parts.extend(chars.chunks(limit).map(|piece| piece.iter().collect::<String>()));
            current_len = 0;
            continue;
        }

        if let Some(chunk) = current.as_mut() {
            if current_len + 1 + line_len <= limit {
                chunk.push('\n');
                chunk.push_str(line);
                current_len += 1 + line_len;
                continue;
            }
        }

        parts.extend(current.replace(line.to_string()));
        current_len = line_len;
    }

    parts.extend(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text() -> String {
        (0..600)
            .map(|i| match i % 4 {
                0 => format!("<b>📌 Тема {}</b>", i),
                1 => String::new(),
                2 => format!("▸ story {} {}", i, "detail ".repeat(i % 13)),
                _ => format!("🔗 <a href=\"https://news.example/{}\">Источник</a>", i),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", MESSAGE_LIMIT), vec!["hello\nworld"]);
        assert_eq!(split_message("", MESSAGE_LIMIT), vec![""]);
    }

    #[test]
    fn chunks_fit_and_reconstruct_exactly() {
        let text = long_text();
        assert!(text.chars().count() > MESSAGE_LIMIT);

        let parts = split_message(&text, MESSAGE_LIMIT);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.chars().count() <= MESSAGE_LIMIT));
        assert_eq!(parts.join("\n"), text);
    }

    #[test]
    fn breaks_only_between_lines() {
        let text = "aaaa\nbbbb\ncccc\n\ndddd";
        let parts = split_message(text, 9);
        assert_eq!(parts, vec!["aaaa\nbbbb", "cccc\n", "dddd"]);
        assert_eq!(parts.join("\n"), text);
    }

    #[test]
    fn over_long_line_is_hard_split() {
        let text = format!("head\n{}\ntail", "x".repeat(25));
        let parts = split_message(&text, 10);
        assert_eq!(parts, vec!["head", "xxxxxxxxxx", "xxxxxxxxxx", "xxxxx", "tail"]);
    }
}
