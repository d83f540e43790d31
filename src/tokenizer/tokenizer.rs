use std::collections::BTreeMap;
use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;
use crate::models::Token;

/// Text tokenizer: unicode word splitting, lowercasing, optional stemming
/// and stopword removal.
///
/// The same pipeline runs at index time and inside exact-phrase rechecks;
/// positions are indices into the filtered stream, so both sides agree as
/// long as they share a configuration.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Tokenize text into the normalized word stream. Position `i` of the
    /// result is position `i` for phrase purposes.
    pub fn split(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = text
            .unicode_words()
            .map(|word| {
                if self.config.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .filter(|token| {
                token.len() >= self.config.min_token_length
                    && token.len() <= self.config.max_token_length
                    && !self.stopwords.contains(token)
            })
            .collect();

        match &self.stemmer {
            Some(stemmer) => tokens
                .into_iter()
                .map(|token| stemmer.stem(&token).to_string())
                .collect(),
            None => tokens,
        }
    }

    /// Tokenize one attribute's text into unique tokens carrying their
    /// positions within the stream, ordered by token name.
    pub fn attribute_tokens(&self, text: &str) -> Vec<Token> {
        let mut grouped: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (pos, word) in self.split(text).into_iter().enumerate() {
            grouped.entry(word).or_default().push(pos as u32);
        }

        grouped
            .into_iter()
            .map(|(name, positions)| Token { name, positions })
            .collect()
    }
}
