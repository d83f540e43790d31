pub mod document;
pub mod query;

pub use document::{Attribute, Content, Document, TimeSpec, Token};
pub use query::{
    DocumentPayload, IndexRequest, IntersectionQuery, MailboxQuery, MailboxQueryRequest, Paging,
    SearchRequest, SearchResult, SingleDocResult, TimeRange,
};
