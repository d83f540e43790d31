//! The per-document index writer.
//!
//! For one tokenized document the writer assigns the indexed id, then emits
//! two batches: the indexes batch (a posting merge plus a shard-directory
//! merge per token) and the documents batch (document body plus the
//! external-id mapping). The indexes batch commits first: a reader that
//! observes a posting whose document body is missing treats it as a
//! tombstone and skips it, while a document without postings stays
//! reachable by external id.

use tracing::info;

use crate::codec::{self, PostingRecord, RecordKind, ShardSetRecord};
use crate::error::Result;
use crate::ids::{external_id_hash, IndexedId};
use crate::index::keys;
use crate::models::{Attribute, Document};
use crate::store::{Store, WriteBatch};

pub struct IndexWriter<'a> {
    store: &'a Store,
}

impl<'a> IndexWriter<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Index one document: assign its id from `(timestamp, sequence,
    /// hash(external id))`, register it under every token of every
    /// attribute, and persist the body. Returns the assigned id.
    pub fn index_document(
        &self,
        doc: &mut Document,
        attributes: &[Attribute],
        tsec: u64,
        tnsec: u32,
    ) -> Result<IndexedId> {
        let opts = self.store.options();

        let seq = self.store.next_sequence()?;
        let id = IndexedId::new(tsec, tnsec, seq, external_id_hash(&doc.id));
        doc.indexed_id = id;

        let shard = keys::shard_for(seq, opts.tokens_shard_size);
        let posting = codec::encode_record(RecordKind::Posting, &PostingRecord { id })?;
        let shard_set = codec::encode_record(
            RecordKind::ShardSet,
            &ShardSetRecord {
                shards: vec![shard],
            },
        )?;

        let mut indexes_batch = WriteBatch::new();
        let mut tokens = 0usize;
        for attr in attributes {
            for token in &attr.tokens {
                let base = keys::posting_base_key(opts, &doc.mailbox, &attr.name, &token.name);
                indexes_batch.merge(keys::posting_shard_key(&base, shard), posting.clone());
                indexes_batch.merge(
                    keys::token_shard_key(opts, &doc.mailbox, &attr.name, &token.name),
                    shard_set.clone(),
                );
                tokens += 1;
            }
        }

        let mut docs_batch = WriteBatch::new();
        docs_batch.put(
            keys::document_key(opts, &id),
            codec::encode_record(RecordKind::Document, doc)?,
        );
        docs_batch.put(
            keys::external_key(opts, &doc.id),
            codec::encode_record(RecordKind::IndexedId, &id)?,
        );

        self.store.write(&indexes_batch)?;
        self.store.write(&docs_batch)?;

        info!(
            mailbox = %doc.mailbox,
            id = %doc.id,
            indexed_id = %id,
            tokens,
            "document indexed"
        );

        Ok(id)
    }
}
