use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::IndexedId;
use crate::models::document::{Attribute, Document, TimeSpec};

/// Wire shape of an `/index` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRequest {
    pub mailbox: String,
    pub docs: Vec<DocumentPayload>,
}

/// One document as submitted by a client. The `index` member maps attribute
/// names to raw text; the service tokenizes it before the writer runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<TimeSpec>,
    #[serde(default)]
    pub content: Option<crate::models::Content>,
    pub index: BTreeMap<String, String>,
}

/// Wire shape of a `/search` request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub paging: Option<Paging>,
    #[serde(default)]
    pub time: Option<TimeRange>,
    pub request: BTreeMap<String, MailboxQueryRequest>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next_document_id: Option<String>,
    #[serde(default)]
    pub max_number: Option<u64>,
}

/// Inclusive lower / exclusive upper bound on the time dimension, seconds.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
}

/// One mailbox's query object: attribute name to raw text. `query` tokens
/// are intersection-required; `exact` phrases are verified against the
/// rendered text after the AND; `negation` tokens reject candidates that
/// contain them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MailboxQueryRequest {
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub exact: BTreeMap<String, String>,
    #[serde(default)]
    pub negation: BTreeMap<String, String>,
}

/// A tokenized mailbox query, ready for intersection.
#[derive(Clone, Debug, Default)]
pub struct MailboxQuery {
    pub mailbox: String,
    /// Required tokens per attribute; the AND runs across every token of
    /// every attribute here. Includes the tokens of `exact` phrases.
    pub attributes: Vec<Attribute>,
    /// Exact phrases per attribute, tokens carrying in-phrase positions.
    pub exact: Vec<Attribute>,
    /// Negated tokens per attribute.
    pub negation: Vec<Attribute>,
}

impl MailboxQuery {
    /// A query with no required tokens matches nothing, not everything.
    pub fn is_empty(&self) -> bool {
        self.attributes.iter().all(|a| a.tokens.is_empty())
    }
}

/// The full parsed search: mailbox queries plus range and paging state.
#[derive(Clone, Debug)]
pub struct IntersectionQuery {
    pub queries: Vec<MailboxQuery>,
    /// Inclusive lower bound of the id range.
    pub range_start: IndexedId,
    /// Exclusive upper bound of the id range.
    pub range_end: IndexedId,
    /// Inclusive seek lower bound for this page: the `next_document_id`
    /// returned by the previous page is the first unconsidered id.
    pub next_document_id: Option<IndexedId>,
    pub max_number: usize,
}

impl Default for IntersectionQuery {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            range_start: IndexedId::default(),
            range_end: IndexedId::MAX,
            next_document_id: None,
            max_number: usize::MAX,
        }
    }
}

/// One accepted document with its accumulated relevance.
#[derive(Clone, Debug)]
pub struct SingleDocResult {
    pub doc: Document,
    /// One point per mailbox the document matched in.
    pub relevance: u32,
}

/// Result of one intersection run.
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Accepted documents in ascending indexed-id order.
    pub docs: Vec<SingleDocResult>,
    /// True iff no further candidates exist past `next_document_id`.
    pub completed: bool,
    /// First unconsidered id; resubmit it verbatim to fetch the next page.
    pub next_document_id: IndexedId,
}
