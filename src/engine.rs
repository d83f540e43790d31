//! The search engine facade the HTTP layer talks to.
//!
//! Owns the store and the metadata flusher lifecycle: the flusher thread
//! holds a weak store reference and is stopped before the store tears
//! down, which forces the final metadata flush.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::error::{MaildexError, Result};
use crate::ids::{wallclock, IndexedId};
use crate::index::IndexWriter;
use crate::models::{
    Attribute, Document, IndexRequest, IntersectionQuery, MailboxQuery, SearchRequest,
    SearchResult, Token,
};
use crate::search::{phrase, Intersector};
use crate::store::metadata::MetadataFlusher;
use crate::store::{ColumnFamily, OpenMode, Store};
use crate::tokenizer::Tokenizer;

pub struct SearchEngine {
    flusher: Option<MetadataFlusher>,
    store: Arc<Store>,
    tokenizer: Tokenizer,
}

impl SearchEngine {
    /// Open the store at `path` and start the periodic metadata flusher
    /// when configured and writable.
    pub fn open(path: &Path, mode: OpenMode, config: Config) -> Result<Self> {
        let store = Arc::new(Store::open(path, mode, config.store.clone())?);

        let flusher = if mode != OpenMode::ReadOnly && config.store.sync_metadata_timeout_ms > 0 {
            Some(MetadataFlusher::spawn(
                Arc::downgrade(&store),
                Duration::from_millis(config.store.sync_metadata_timeout_ms),
            ))
        } else {
            None
        };

        Ok(Self {
            flusher,
            store,
            tokenizer: Tokenizer::new(&config.tokenizer),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Ingest a batch of documents into one mailbox. Returns how many were
    /// indexed; the first failing document aborts the rest.
    pub fn index(&self, req: &IndexRequest) -> Result<usize> {
        if req.mailbox.is_empty() {
            return Err(MaildexError::InvalidArgument(
                "'mailbox' must be a non-empty string".to_string(),
            ));
        }
        if req.docs.is_empty() {
            return Err(MaildexError::InvalidArgument(
                "'docs' must be a non-empty array".to_string(),
            ));
        }

        let writer = IndexWriter::new(&self.store);
        let mut indexed = 0usize;
        for payload in &req.docs {
            if payload.id.is_empty() {
                return Err(MaildexError::InvalidArgument(
                    "'id' must be a non-empty string".to_string(),
                ));
            }
            let (tsec, tnsec) = match payload.timestamp {
                Some(ts) => (ts.tsec, ts.tnsec),
                None => wallclock(),
            };
            let mut doc = Document {
                mailbox: req.mailbox.clone(),
                id: payload.id.clone(),
                indexed_id: IndexedId::default(),
                author: payload.author.clone().unwrap_or_default(),
                content: payload.content.clone().unwrap_or_default(),
            };
            let attributes: Vec<Attribute> = payload
                .index
                .iter()
                .map(|(name, text)| Attribute {
                    name: name.clone(),
                    tokens: self.tokenizer.attribute_tokens(text),
                })
                .collect();

            writer.index_document(&mut doc, &attributes, tsec, tnsec)?;
            indexed += 1;
        }

        info!(mailbox = %req.mailbox, docs = indexed, "ingest completed");
        Ok(indexed)
    }

    /// Run a search: tokenize the request, intersect, recheck phrases and
    /// negations against rendered text.
    pub fn search(&self, req: &SearchRequest) -> Result<SearchResult> {
        let iq = self.parse_query(req)?;

        let tokenizer = &self.tokenizer;
        let mut recheck = |mq: &MailboxQuery, doc: &Document| -> bool {
            for attr in &mq.exact {
                let content = rendered_stream(tokenizer, &attr.name, doc);
                if !phrase::check_exact(&attr.tokens, &content) {
                    return false;
                }
            }
            for attr in &mq.negation {
                let content = rendered_stream(tokenizer, &attr.name, doc);
                if phrase::check_negation(&attr.tokens, &content) {
                    return false;
                }
            }
            true
        };

        let intersector = Intersector::new(&self.store);
        Ok(intersector.intersect(&iq, &mut recheck))
    }

    /// Full-range compaction of both column families.
    pub fn compact(&self) -> Result<()> {
        self.store.compact(ColumnFamily::Documents, None)?;
        self.store.compact(ColumnFamily::Indexes, None)
    }

    /// Point read by indexed id.
    pub fn document(&self, id: &IndexedId) -> Result<Document> {
        self.store.get_document(id)
    }

    /// Resolve an external id to its most recent indexed id.
    pub fn resolve(&self, external_id: &str) -> Result<IndexedId> {
        self.store.resolve(external_id)
    }

    /// Force a metadata flush.
    pub fn sync(&self) -> Result<()> {
        self.store.sync_metadata()
    }

    fn parse_query(&self, req: &SearchRequest) -> Result<IntersectionQuery> {
        let mut iq = IntersectionQuery::default();

        if let Some(paging) = &req.paging {
            if let Some(cursor) = &paging.next_document_id {
                if !cursor.is_empty() {
                    iq.next_document_id = Some(IndexedId::parse(cursor)?);
                }
            }
            if let Some(max) = paging.max_number {
                iq.max_number = usize::try_from(max).unwrap_or(usize::MAX);
            }
        }

        if let Some(time) = &req.time {
            if let Some(start) = time.start {
                iq.range_start = IndexedId::from_timestamp(start, 0);
            }
            if let Some(end) = time.end {
                iq.range_end = IndexedId::from_timestamp(end, 0);
            }
        }

        for (mailbox, mqr) in &req.request {
            let mut mq = MailboxQuery {
                mailbox: mailbox.clone(),
                ..Default::default()
            };

            // Required tokens: the query tokens plus every exact phrase's
            // tokens, deduplicated per attribute.
            let mut required: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
            for (attr, text) in &mqr.query {
                required
                    .entry(attr.as_str())
                    .or_default()
                    .extend(self.tokenizer.split(text));
            }
            for (attr, phrase_text) in &mqr.exact {
                let tokens = self.tokenizer.attribute_tokens(phrase_text);
                required
                    .entry(attr.as_str())
                    .or_default()
                    .extend(tokens.iter().map(|t| t.name.clone()));
                mq.exact.push(Attribute {
                    name: attr.clone(),
                    tokens,
                });
            }
            for (attr, text) in &mqr.negation {
                mq.negation.push(Attribute {
                    name: attr.clone(),
                    tokens: self
                        .tokenizer
                        .split(text)
                        .into_iter()
                        .map(|name| Token {
                            name,
                            positions: Vec::new(),
                        })
                        .collect(),
                });
            }

            mq.attributes = required
                .into_iter()
                .map(|(name, names)| Attribute {
                    name: name.to_string(),
                    tokens: names
                        .into_iter()
                        .map(|name| Token {
                            name,
                            positions: Vec::new(),
                        })
                        .collect(),
                })
                .collect();

            iq.queries.push(mq);
        }

        Ok(iq)
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.as_mut() {
            flusher.stop();
        }
    }
}

/// The rendered word stream an attribute's recheck runs against: title
/// attributes check the title, everything else checks the body.
fn rendered_stream(tokenizer: &Tokenizer, attr_name: &str, doc: &Document) -> Vec<String> {
    if attr_name.contains("title") {
        tokenizer.split(&doc.content.title)
    } else {
        tokenizer.split(&doc.content.content)
    }
}
