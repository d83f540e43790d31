use serde::{Deserialize, Serialize};

/// Store tuning and key layout options.
///
/// The prefix strings define the on-disk key namespaces; they are
/// configurable but every database must be opened with the prefixes it was
/// written with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Postings per shard. Larger values mean fewer keys but larger merges.
    pub tokens_shard_size: u64,
    /// Bloom filter bits per key (tuning hint for the backing store).
    pub bits_per_key: u32,
    /// Block cache size in bytes (tuning hint for the backing store).
    pub lru_cache_size: u64,
    /// Interval of the periodic metadata flush, in milliseconds. 0 disables
    /// the flusher; the sequence reservation still persists synchronously.
    pub sync_metadata_timeout_ms: u64,
    /// Reserved for transactional variants; not used by this engine.
    pub transaction_expiration_ms: u64,
    /// Reserved for transactional variants; not used by this engine.
    pub transaction_lock_timeout_ms: u64,
    /// Reserved. 0 disables n-gram indexing of short tokens.
    pub ngram_index_size: u32,
    /// How many sequence numbers a single metadata write reserves ahead of
    /// use. A crash loses at most one window, never reuses one.
    pub sequence_reserve_window: u64,

    pub document_prefix: String,
    pub external_prefix: String,
    pub token_shard_prefix: String,
    pub index_prefix: String,
    pub metadata_key: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            tokens_shard_size: 4_000_000,
            bits_per_key: 10,
            lru_cache_size: 100 * 1024 * 1024,
            sync_metadata_timeout_ms: 60_000,
            transaction_expiration_ms: 60_000,
            transaction_lock_timeout_ms: 60_000,
            ngram_index_size: 0,
            sequence_reserve_window: 8192,
            document_prefix: "documents.".to_string(),
            external_prefix: "ids.".to_string(),
            token_shard_prefix: "token_shards.".to_string(),
            index_prefix: "index.".to_string(),
            metadata_key: "maildex.meta.key".to_string(),
        }
    }
}

/// Tokenizer configuration
///
/// Stemming and stopword removal are off by default: exact-phrase rechecks
/// compare token streams positionally, so the index-side and recheck-side
/// pipelines must both stay literal unless both are reconfigured together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub language: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 64,
            language: "english".to_string(),
        }
    }
}

/// Full engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreOptions,
    pub tokenizer: TokenizerConfig,
}

impl Config {
    pub fn with_tokens_shard_size(mut self, size: u64) -> Self {
        self.store.tokens_shard_size = size;
        self
    }

    pub fn with_sync_metadata_timeout_ms(mut self, ms: u64) -> Self {
        self.store.sync_metadata_timeout_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let opts = StoreOptions::default();
        assert_eq!(opts.tokens_shard_size, 4_000_000);
        assert_eq!(opts.bits_per_key, 10);
        assert_eq!(opts.lru_cache_size, 100 * 1024 * 1024);
        assert_eq!(opts.sync_metadata_timeout_ms, 60_000);
        assert_eq!(opts.ngram_index_size, 0);
        assert_eq!(opts.document_prefix, "documents.");
        assert_eq!(opts.token_shard_prefix, "token_shards.");
        assert_eq!(opts.index_prefix, "index.");

        let tok = TokenizerConfig::default();
        assert!(tok.lowercase);
        assert!(!tok.stem);
        assert!(!tok.remove_stopwords);
    }

    #[test]
    fn test_config_builders() {
        let config = Config::default()
            .with_tokens_shard_size(5)
            .with_sync_metadata_timeout_ms(0);
        assert_eq!(config.store.tokens_shard_size, 5);
        assert_eq!(config.store.sync_metadata_timeout_ms, 0);
    }
}
