//! Key construction for the two column families.
//!
//! Posting lists accumulate under
//! `index.<mailbox>.<attribute>.<token>.<shard>` so that one shard's
//! postings live together; the shard directory for a token accumulates
//! under `token_shards.<mailbox>.<attribute>.<token>`. Document bodies and
//! the external-id secondary index use the `documents.` and `ids.`
//! prefixes.

use crate::config::StoreOptions;
use crate::ids::IndexedId;

/// Posting-list key for one token, without the shard component.
pub fn posting_base_key(opts: &StoreOptions, mailbox: &str, attribute: &str, token: &str) -> String {
    format!("{}{}.{}.{}", opts.index_prefix, mailbox, attribute, token)
}

/// Posting-list key of one shard.
pub fn posting_shard_key(base: &str, shard: u64) -> String {
    format!("{}.{}", base, shard)
}

/// Shard-directory key for one token.
pub fn token_shard_key(opts: &StoreOptions, mailbox: &str, attribute: &str, token: &str) -> String {
    format!(
        "{}{}.{}.{}",
        opts.token_shard_prefix, mailbox, attribute, token
    )
}

/// Document-body key.
pub fn document_key(opts: &StoreOptions, id: &IndexedId) -> String {
    format!("{}{}", opts.document_prefix, id)
}

/// External-id secondary index key.
pub fn external_key(opts: &StoreOptions, external_id: &str) -> String {
    format!("{}{}", opts.external_prefix, external_id)
}

/// Shard a document's postings land in, from its sequence number.
pub fn shard_for(seq: u64, tokens_shard_size: u64) -> u64 {
    seq / tokens_shard_size.max(1)
}
