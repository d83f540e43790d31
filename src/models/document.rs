use serde::{Deserialize, Serialize};

use crate::ids::IndexedId;

/// Timestamp as carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub tsec: u64,
    pub tnsec: u32,
}

/// Rendered content block of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A stored document. Immutable once written: there is no update or delete
/// path, a re-ingest of the same external id produces a new document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub mailbox: String,
    /// External, user-supplied id.
    pub id: String,
    /// Internal sortable id, assigned on ingest.
    pub indexed_id: IndexedId,
    pub author: String,
    pub content: Content,
}

/// A normalized word with its positions in an attribute's token stream.
/// Positions are only consumed by exact-phrase rechecks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub positions: Vec<u32>,
}

/// One named attribute's token stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub tokens: Vec<Token>,
}
