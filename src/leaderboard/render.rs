use std::sync::{Mutex, PoisonError};

use super::score_record::ScoreRecord;
use crate::fmt;

/// Displays the leaderboard text. Each call replaces whatever was shown before.
pub trait PresentationSink: Send + Sync {
    fn render(&self, text: &str);
}

pub fn render_scores(records: &[ScoreRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| fmt!("{}. {} - {}", i + 1, r.name(), r.score()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keeps the last rendered text in memory.
#[derive(Debug, Default)]
pub struct TextSink {
    text: Mutex<String>,
}

impl TextSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PresentationSink for TextSink {
    fn render(&self, text: &str) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_indexed_lines() {
        let records = vec![
            ScoreRecord::new("A", 50).unwrap(),
            ScoreRecord::new("C", 40).unwrap(),
            ScoreRecord::new("B", 30).unwrap(),
        ];
        assert_eq!(render_scores(&records), "1. A - 50\n2. C - 40\n3. B - 30");
    }

    #[test]
    fn empty_list_renders_empty_text() {
        assert_eq!(render_scores(&[]), "");
    }

    #[test]
    fn text_sink_replaces_previous_text() {
        let sink = TextSink::new();
        sink.render("1. A - 50\n2. B - 30");
        sink.render("1. Z - 1");
        assert_eq!(sink.text(), "1. Z - 1");
    }
}
