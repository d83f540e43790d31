//! Associative merge operators, dispatched by key prefix.
//!
//! A merge appends an operand frame to a cell without decoding it; this
//! module is the read-side collapse. `index.` cells union postings into a
//! sorted unique list, `token_shards.` cells union shard-index sets. Both
//! unions are associative and idempotent, so concurrent writers may merge
//! in any grouping and any order. Operand frames queue in the cell until a
//! read or a compaction collapses them (the partial-merge path always
//! declines).
//!
//! A merge operand under any other prefix is a programming error and is
//! surfaced as `Internal`.

use std::collections::BTreeSet;

use crate::codec::{self, PostingListRecord, PostingRecord, RecordKind, ShardSetRecord};
use crate::config::StoreOptions;
use crate::error::{MaildexError, Result};
use crate::ids::IndexedId;

/// Whether a key participates in merge dispatch at all.
pub fn is_merge_key(opts: &StoreOptions, key: &[u8]) -> bool {
    key.starts_with(opts.index_prefix.as_bytes())
        || key.starts_with(opts.token_shard_prefix.as_bytes())
}

/// Collapse a cell's frames into one canonical record.
///
/// Frames arrive oldest first; the first frame may be a canonical base (a
/// posting list or shard set) or, when the key was never compacted, just
/// another operand.
pub fn full_merge(opts: &StoreOptions, key: &[u8], frames: &[&[u8]]) -> Result<Vec<u8>> {
    if key.starts_with(opts.token_shard_prefix.as_bytes()) {
        return merge_token_shards(key, frames);
    }
    if key.starts_with(opts.index_prefix.as_bytes()) {
        return merge_postings(key, frames);
    }
    Err(MaildexError::Internal(format!(
        "merge dispatch on unknown key prefix: '{}'",
        String::from_utf8_lossy(key)
    )))
}

fn merge_postings(key: &[u8], frames: &[&[u8]]) -> Result<Vec<u8>> {
    let mut unique: BTreeSet<IndexedId> = BTreeSet::new();

    for frame in frames {
        match codec::peek_kind(frame) {
            Some((RecordKind::PostingList, _)) => {
                let list: PostingListRecord =
                    codec::decode_record(key, RecordKind::PostingList, frame)?;
                unique.extend(list.ids);
            }
            Some((RecordKind::Posting, _)) => {
                let posting: PostingRecord = codec::decode_record(key, RecordKind::Posting, frame)?;
                unique.insert(posting.id);
            }
            Some((kind, _)) => {
                return Err(MaildexError::corruption(
                    key,
                    format!("unexpected {:?} record in posting cell", kind),
                ))
            }
            None => return Err(MaildexError::corruption(key, "unreadable posting record")),
        }
    }

    codec::encode_record(
        RecordKind::PostingList,
        &PostingListRecord {
            ids: unique.into_iter().collect(),
        },
    )
}

fn merge_token_shards(key: &[u8], frames: &[&[u8]]) -> Result<Vec<u8>> {
    let mut shards: BTreeSet<u64> = BTreeSet::new();

    for frame in frames {
        let set: ShardSetRecord = codec::decode_record(key, RecordKind::ShardSet, frame)?;
        shards.extend(set.shards);
    }

    codec::encode_record(
        RecordKind::ShardSet,
        &ShardSetRecord {
            shards: shards.into_iter().collect(),
        },
    )
}
