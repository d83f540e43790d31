use serde::{Deserialize, Serialize};

use crate::models::{SearchResult, TimeSpec};

/// One search hit as it goes out on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub indexed_id: String,
    pub author: String,
    pub content: ContentReply,
    pub relevance: u32,
    pub timestamp: TimeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentReply {
    pub title: String,
    pub content: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// `/search` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReply {
    pub ids: Vec<SearchHit>,
    pub completed: bool,
    pub next_document_id: String,
}

impl From<SearchResult> for SearchReply {
    fn from(result: SearchResult) -> Self {
        let ids = result
            .docs
            .into_iter()
            .map(|hit| {
                let (tsec, tnsec) = hit.doc.indexed_id.timestamp();
                SearchHit {
                    id: hit.doc.id,
                    indexed_id: hit.doc.indexed_id.to_string(),
                    author: hit.doc.author,
                    content: ContentReply {
                        title: hit.doc.content.title,
                        content: hit.doc.content.content,
                        links: hit.doc.content.links,
                        images: hit.doc.content.images,
                    },
                    relevance: hit.relevance,
                    timestamp: TimeSpec { tsec, tnsec },
                }
            })
            .collect();

        Self {
            ids,
            completed: result.completed,
            next_document_id: result.next_document_id.to_string(),
        }
    }
}

/// Error body: `{"error": {"message": ..., "code": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: i32,
}

impl ErrorReply {
    pub fn new(message: impl Into<String>, code: i32) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_shape() {
        let reply = ErrorReply::new("'mailbox' must be a non-empty string", -22);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["error"]["code"], -22);
        assert!(json["error"]["message"].as_str().unwrap().contains("mailbox"));
    }
}
