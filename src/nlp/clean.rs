//! Review text normalisation ahead of embedding.
//!
//! Steps run in a fixed order: strip punctuation, drop duplicates, drop short
//! reviews, lemmatize, lowercase, remove stopwords. Reordering them changes
//! which reviews survive.

use std::collections::HashSet;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::lemma::Lemmatizer;
use crate::error::{PipelineError, Result};

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]+").expect("valid regex"));

/// English stopword list shipped with `stop-words`, lowercased.
pub fn english_stopwords() -> HashSet<String> {
    stop_words::get(stop_words::LANGUAGE::English)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
}

#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Reviews with fewer words after stripping are dropped.
    pub min_words: usize,
    pub extra_stopwords: Vec<String>,
    /// Words removed from the default stopword list.
    pub keep_words: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            min_words: 6,
            extra_stopwords: Vec::new(),
            keep_words: Vec::new(),
        }
    }
}

/// One review that survived cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedText {
    /// Position of the source text in the input sequence.
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanOutput {
    pub items: Vec<CleanedText>,
    /// Words across all cleaned texts.
    pub word_count: usize,
}

impl CleanOutput {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.text.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct TextCleaner {
    min_words: usize,
    stopwords: HashSet<String>,
    lemmatizer: Lemmatizer,
}

impl TextCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        let base = english_stopwords();
        let lemmatizer = Lemmatizer::new(base.iter().cloned());
        let mut stopwords = base;
        stopwords.extend(config.extra_stopwords.iter().map(|w| w.to_lowercase()));
        for word in &config.keep_words {
            stopwords.remove(&word.to_lowercase());
        }
        Self {
            min_words: config.min_words,
            stopwords,
            lemmatizer,
        }
    }

    /// Clean a sequence of possibly missing review bodies.
    ///
    /// A missing body is a fatal [`PipelineError::MissingField`]; empty input
    /// yields an empty output.
    pub fn clean<I, S>(&self, raw: I) -> Result<CleanOutput>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut seen = IndexSet::new();
        let mut kept = Vec::new();
        for (index, text) in raw.into_iter().enumerate() {
            let text = text.ok_or(PipelineError::MissingField("review"))?;
            let stripped = NON_ALNUM.replace_all(text.as_ref(), "").into_owned();
            if !seen.insert(stripped.clone()) {
                continue;
            }
            if stripped.split_whitespace().count() < self.min_words {
                continue;
            }
            kept.push((index, stripped));
        }

        let items: Vec<CleanedText> = kept
            .into_iter()
            .map(|(index, stripped)| {
                let lemmatized = stripped
                    .split_whitespace()
                    .map(|token| self.lemmatizer.lemmatize(token))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                let words: Vec<&str> = lemmatized
                    .split_whitespace()
                    .filter(|word| !self.stopwords.contains(*word))
                    .collect();
                CleanedText {
                    index,
                    word_count: words.len(),
                    text: words.join(" "),
                }
            })
            .collect();

        let word_count = items.iter().map(|item| item.word_count).sum();
        debug!(kept = items.len(), word_count, "cleaned review batch");
        Ok(CleanOutput { items, word_count })
    }

    /// Convenience wrapper for texts that are known to be present.
    pub fn clean_texts<S: AsRef<str>>(&self, raw: &[S]) -> CleanOutput {
        let output = self.clean(raw.iter().map(|s| Some(s.as_ref())));
        // every input is Some, so MissingField cannot occur
        output.unwrap_or_default()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_before_deduplicating() {
        let cleaner = TextCleaner::default();
        let out = cleaner.clean_texts(&[
            "Great product really love it works well",
            "Great product really love it works well!",
            "bad",
        ]);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].index, 0);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let cleaner = TextCleaner::default();
        let out = cleaner.clean(Vec::<Option<String>>::new()).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.word_count, 0);
    }

    #[test]
    fn missing_text_is_fatal() {
        let cleaner = TextCleaner::default();
        let err = cleaner
            .clean(vec![Some("fine battery charger cable screen motor"), None])
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingField("review")));
    }

    #[test]
    fn lowercases_lemmatizes_and_drops_stopwords() {
        let cleaner = TextCleaner::default();
        let out = cleaner.clean_texts(&["The Batteries and the Chargers died after two weeks"]);
        let text = &out.items[0].text;
        assert!(text.contains("battery"));
        assert!(text.contains("charger"));
        assert!(!text.split(' ').any(|w| w == "the" || w == "and"));
        assert_eq!(out.items[0].word_count, text.split_whitespace().count());
    }

    #[test]
    fn word_threshold_counts_stripped_words() {
        let cleaner = TextCleaner::new(CleanerConfig {
            min_words: 3,
            ..CleanerConfig::default()
        });
        let out = cleaner.clean_texts(&["zipper broke fast", "zipper broke"]);
        assert_eq!(out.items.len(), 1);
    }

    #[test]
    fn stopword_overrides_apply() {
        let cleaner = TextCleaner::new(CleanerConfig {
            min_words: 1,
            extra_stopwords: vec!["Zipper".into()],
            keep_words: vec!["not".into()],
        });
        let out = cleaner.clean_texts(&["zipper not sturdy"]);
        assert_eq!(out.items[0].text, "not sturdy");
    }
}
