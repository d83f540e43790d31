//! Thin wrapper over the ordered KV store.
//!
//! Two keyspaces act as the logical column families: `documents` (document
//! bodies plus the external-id secondary index) and `indexes` (posting
//! lists, shard directories, metadata). Writes route to a column family by
//! key prefix. Merge operands append as frames under the store write lock
//! and collapse through the merge dispatch on read or compaction.

pub mod merge;
pub mod metadata;

use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec::{self, MetadataRecord, PostingListRecord, RecordKind, ShardSetRecord};
use crate::config::StoreOptions;
use crate::error::{MaildexError, Result};
use crate::ids::IndexedId;
use crate::models::Document;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use metadata::Metadata;

const DOCUMENTS_CF: &str = "documents";
const INDEXES_CF: &str = "indexes";

/// The two logical column families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnFamily {
    Documents,
    Indexes,
}

impl ColumnFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Documents => DOCUMENTS_CF,
            ColumnFamily::Indexes => INDEXES_CF,
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            DOCUMENTS_CF => Ok(ColumnFamily::Documents),
            INDEXES_CF => Ok(ColumnFamily::Indexes),
            other => Err(MaildexError::InvalidArgument(format!(
                "unknown column '{}', supported: {}, {}",
                other, DOCUMENTS_CF, INDEXES_CF
            ))),
        }
    }
}

/// How the store is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    /// Write-throughput hint: widens the sequence reservation window.
    BulkLoad,
}

/// One pending mutation.
#[derive(Clone, Debug)]
pub enum BatchOp {
    Put { key: Vec<u8>, record: Vec<u8> },
    Merge { key: Vec<u8>, operand: Vec<u8> },
}

/// A set of puts and merges applied together under the store write lock.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, record: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            record,
        });
    }

    pub fn merge(&mut self, key: impl Into<Vec<u8>>, operand: Vec<u8>) {
        self.ops.push(BatchOp::Merge {
            key: key.into(),
            operand,
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn storage<E: std::fmt::Display>(e: E) -> MaildexError {
    MaildexError::Storage(e.to_string())
}

/// Handle to the on-disk state. Shared by all readers and writers; owns the
/// metadata singleton.
pub struct Store {
    db: Database,
    documents: Keyspace,
    indexes: Keyspace,
    opts: StoreOptions,
    mode: OpenMode,
    meta: Metadata,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open (or create) the database at `path` and load the metadata
    /// singleton.
    pub fn open(path: &Path, mode: OpenMode, opts: StoreOptions) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let db = Database::builder(path).open().map_err(storage)?;

        let documents = db
            .keyspace(DOCUMENTS_CF, || KeyspaceCreateOptions::default())
            .map_err(storage)?;
        let indexes = db
            .keyspace(INDEXES_CF, || KeyspaceCreateOptions::default())
            .map_err(storage)?;

        info!(
            path = %path.display(),
            ?mode,
            lru_cache_size = opts.lru_cache_size,
            bits_per_key = opts.bits_per_key,
            "store opened"
        );

        let seq = load_persisted_sequence(&indexes, &opts)?;
        debug!(seq, "metadata loaded");

        Ok(Self {
            db,
            documents,
            indexes,
            meta: Metadata::new(seq),
            opts,
            mode,
            write_lock: Mutex::new(()),
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.opts
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn keyspace(&self, cf: ColumnFamily) -> &Keyspace {
        match cf {
            ColumnFamily::Documents => &self.documents,
            ColumnFamily::Indexes => &self.indexes,
        }
    }

    /// Column family a key belongs to, by prefix convention.
    pub fn route(&self, key: &[u8]) -> ColumnFamily {
        if key.starts_with(self.opts.document_prefix.as_bytes())
            || key.starts_with(self.opts.external_prefix.as_bytes())
        {
            ColumnFamily::Documents
        } else {
            ColumnFamily::Indexes
        }
    }

    /// Raw cell bytes as stored, frames and all.
    fn raw_cell(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .keyspace(cf)
            .get(key)
            .map_err(storage)?
            .map(|v| v.as_ref().to_vec()))
    }

    /// Collapsed record bytes of a cell, or None when the key is absent.
    pub fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(cell) = self.raw_cell(cf, key)? else {
            return Ok(None);
        };
        let frames = codec::split_frames(key, &cell)?;
        match frames.len() {
            0 => Ok(None),
            1 => Ok(Some(frames[0].to_vec())),
            _ => merge::full_merge(&self.opts, key, &frames).map(Some),
        }
    }

    /// Apply a batch of puts and merges under the write lock.
    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(MaildexError::InvalidArgument(
                "write on a read-only store".to_string(),
            ));
        }

        let _guard = self.write_lock.lock();
        for op in &batch.ops {
            match op {
                BatchOp::Put { key, record } => {
                    self.keyspace(self.route(key))
                        .insert(key, codec::single_frame(record))
                        .map_err(storage)?;
                }
                BatchOp::Merge { key, operand } => {
                    if !merge::is_merge_key(&self.opts, key) {
                        return Err(MaildexError::Internal(format!(
                            "merge on unknown key prefix: '{}'",
                            String::from_utf8_lossy(key)
                        )));
                    }
                    let ks = self.keyspace(self.route(key));
                    let mut cell = ks
                        .get(key)
                        .map_err(storage)?
                        .map(|v| v.as_ref().to_vec())
                        .unwrap_or_default();
                    codec::push_frame(&mut cell, operand);
                    ks.insert(key, cell).map_err(storage)?;
                }
            }
        }
        Ok(())
    }

    /// Forward cursor over a column family, starting at `from` (or the
    /// first key).
    pub fn iter(&self, cf: ColumnFamily, from: Option<&[u8]>) -> StoreIter<'_> {
        StoreIter::new(self, cf, from)
    }

    /// Synchronously canonicalize every multi-frame cell in the inclusive
    /// key range (the whole column when `range` is None): queued merge
    /// operands collapse and the cell is rewritten in canonical form.
    pub fn compact(&self, cf: ColumnFamily, range: Option<(&[u8], &[u8])>) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(MaildexError::InvalidArgument(
                "compact on a read-only store".to_string(),
            ));
        }

        let bounds: (Bound<Vec<u8>>, Bound<Vec<u8>>) = match range {
            Some((from, to)) => (
                Bound::Included(from.to_vec()),
                Bound::Included(to.to_vec()),
            ),
            None => (Bound::Unbounded, Bound::Unbounded),
        };

        let mut cells = 0u64;
        let mut collapsed = 0u64;
        for entry in self.keyspace(cf).range(bounds) {
            let key = entry.key().map_err(storage)?;
            let key = key.as_ref().to_vec();
            cells += 1;
            if self.canonicalize_cell(cf, &key)? {
                collapsed += 1;
            }
        }

        debug!(cf = cf.name(), cells, collapsed, "compaction pass");
        Ok(())
    }

    /// Rewrite one cell in canonical single-frame form. Returns whether a
    /// rewrite happened.
    fn canonicalize_cell(&self, cf: ColumnFamily, key: &[u8]) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let Some(cell) = self.raw_cell(cf, key)? else {
            return Ok(false);
        };
        let frames = codec::split_frames(key, &cell)?;
        if frames.len() < 2 {
            return Ok(false);
        }
        let merged = merge::full_merge(&self.opts, key, &frames)?;
        self.keyspace(cf)
            .insert(key, codec::single_frame(&merged))
            .map_err(storage)?;
        Ok(true)
    }

    // Typed readers.

    /// Load a document by indexed id.
    pub fn get_document(&self, id: &IndexedId) -> Result<Document> {
        let key = format!("{}{}", self.opts.document_prefix, id);
        match self.get(ColumnFamily::Documents, key.as_bytes())? {
            Some(record) => codec::decode_record(key.as_bytes(), RecordKind::Document, &record),
            None => Err(MaildexError::NotFound(key)),
        }
    }

    /// Resolve an external id to the indexed id of its most recent ingest.
    pub fn resolve(&self, external_id: &str) -> Result<IndexedId> {
        let key = format!("{}{}", self.opts.external_prefix, external_id);
        match self.get(ColumnFamily::Documents, key.as_bytes())? {
            Some(record) => codec::decode_record(key.as_bytes(), RecordKind::IndexedId, &record),
            None => Err(MaildexError::NotFound(key)),
        }
    }

    /// Posting list stored under a full (sharded) token key. Absent key is
    /// an empty list; decode failures propagate for the caller to skip.
    pub fn get_posting_list(&self, key: &[u8]) -> Result<Vec<IndexedId>> {
        match self.get(ColumnFamily::Indexes, key)? {
            Some(record) => {
                let list: PostingListRecord =
                    codec::decode_record(key, RecordKind::PostingList, &record)?;
                Ok(list.ids)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Shard directory for a token. Read or decode failures collapse into
    /// an empty set: a token we cannot discover shards for matches nothing.
    pub fn get_shards(&self, key: &[u8]) -> Vec<u64> {
        let record = match self.get(ColumnFamily::Indexes, key) {
            Ok(Some(record)) => record,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %String::from_utf8_lossy(key), "shard directory read failed: {}", e);
                return Vec::new();
            }
        };
        match codec::decode_record::<ShardSetRecord>(key, RecordKind::ShardSet, &record) {
            Ok(set) => set.shards,
            Err(e) => {
                warn!(key = %String::from_utf8_lossy(key), "shard directory decode failed: {}", e);
                Vec::new()
            }
        }
    }

    // Sequence / metadata.

    /// Hand out the next sequence value, persisting a fresh reservation
    /// first whenever the handed-out value would reach the persisted one.
    pub fn next_sequence(&self) -> Result<u64> {
        if self.mode == OpenMode::ReadOnly {
            return Err(MaildexError::InvalidArgument(
                "sequence allocation on a read-only store".to_string(),
            ));
        }
        let seq = self.meta.next();
        if seq >= self.meta.reserved() {
            let _guard = self.write_lock.lock();
            if self.meta.current() > self.meta.reserved() {
                self.reserve_locked()?;
            }
        }
        Ok(seq)
    }

    /// Current sequence value; test and introspection hook.
    pub fn sequence(&self) -> u64 {
        self.meta.current()
    }

    /// Persist the metadata if dirty. Persists a reservation window ahead
    /// of the live counter so a crash never replays a consumed value.
    pub fn sync_metadata(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly || !self.meta.dirty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        if !self.meta.dirty() {
            return Ok(());
        }
        self.reserve_locked()?;
        self.meta.clear_dirty();
        Ok(())
    }

    fn reserve_window(&self) -> u64 {
        match self.mode {
            OpenMode::BulkLoad => self.opts.sequence_reserve_window * 16,
            _ => self.opts.sequence_reserve_window,
        }
    }

    fn reserve_locked(&self) -> Result<()> {
        let target = self.meta.current() + self.reserve_window();
        let record = codec::encode_record(RecordKind::Metadata, &MetadataRecord { seq: target })?;
        self.indexes
            .insert(self.opts.metadata_key.as_bytes(), codec::single_frame(&record))
            .map_err(storage)?;
        self.meta.set_reserved(target);
        Ok(())
    }

}

/// Read the persisted sequence value, before the store handle exists.
fn load_persisted_sequence(indexes: &Keyspace, opts: &StoreOptions) -> Result<u64> {
    let key = opts.metadata_key.as_bytes();
    let Some(cell) = indexes.get(key).map_err(storage)? else {
        return Ok(0);
    };
    let cell = cell.as_ref().to_vec();
    let frames = codec::split_frames(key, &cell)?;
    let Some(record) = frames.first() else {
        return Ok(0);
    };
    let meta: MetadataRecord = codec::decode_record(key, RecordKind::Metadata, record)?;
    Ok(meta.seq)
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.mode != OpenMode::ReadOnly {
            if let Err(e) = self.sync_metadata() {
                warn!("final metadata flush failed: {}", e);
            }
        }
    }
}

/// Forward-only ordered cursor over one column family. Yields raw cell
/// bytes as stored; not shared across threads, each query builds its own.
pub struct StoreIter<'a> {
    store: &'a Store,
    cf: ColumnFamily,
    inner: Box<dyn Iterator<Item = std::result::Result<Vec<u8>, String>> + 'a>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    status: Option<MaildexError>,
}

impl<'a> StoreIter<'a> {
    fn new(store: &'a Store, cf: ColumnFamily, from: Option<&[u8]>) -> Self {
        let inner = Self::make(store, cf, from);
        let mut iter = Self {
            store,
            cf,
            inner,
            current: None,
            status: None,
        };
        iter.advance();
        iter
    }

    fn make(
        store: &'a Store,
        cf: ColumnFamily,
        from: Option<&[u8]>,
    ) -> Box<dyn Iterator<Item = std::result::Result<Vec<u8>, String>> + 'a> {
        let bounds: (Bound<Vec<u8>>, Bound<Vec<u8>>) = match from {
            Some(from) => (Bound::Included(from.to_vec()), Bound::Unbounded),
            None => (Bound::Unbounded, Bound::Unbounded),
        };
        Box::new(store.keyspace(cf).range(bounds).map(|entry| {
            entry
                .key()
                .map(|k| k.as_ref().to_vec())
                .map_err(|e| e.to_string())
        }))
    }

    fn advance(&mut self) {
        self.current = None;
        if self.status.is_some() {
            return;
        }
        for item in self.inner.by_ref() {
            match item {
                Ok(key) => match self.store.raw_cell(self.cf, &key) {
                    Ok(Some(value)) => {
                        self.current = Some((key, value));
                        return;
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        self.status = Some(e);
                        return;
                    }
                },
                Err(e) => {
                    self.status = Some(MaildexError::Storage(e));
                    return;
                }
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Current key, while `valid`.
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// Current raw cell bytes, while `valid`.
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    pub fn next(&mut self) {
        self.advance();
    }

    /// Reposition at the first key >= `key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.status = None;
        self.inner = Self::make(self.store, self.cf, Some(key));
        self.advance();
    }

    /// Take the terminal error, if iteration stopped on one.
    pub fn status(&mut self) -> Result<()> {
        match self.status.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
