//! End-to-end search scenarios driven through the engine facade.

use std::collections::BTreeMap;

use maildex::models::{
    Content, DocumentPayload, IndexRequest, MailboxQueryRequest, Paging, SearchRequest, TimeRange,
    TimeSpec,
};
use maildex::{Config, OpenMode, SearchEngine, TokenizerConfig};
use tempfile::TempDir;

fn open_engine(dir: &TempDir, config: Config) -> SearchEngine {
    SearchEngine::open(dir.path(), OpenMode::ReadWrite, config).unwrap()
}

fn test_config() -> Config {
    // No background flusher in tests; reservations still persist.
    Config::default().with_sync_metadata_timeout_ms(0)
}

fn doc(id: &str, content: &str, tsec: u64) -> DocumentPayload {
    DocumentPayload {
        id: id.to_string(),
        author: Some("tester".to_string()),
        timestamp: Some(TimeSpec { tsec, tnsec: 0 }),
        content: Some(Content {
            title: String::new(),
            content: content.to_string(),
            links: Vec::new(),
            images: Vec::new(),
        }),
        index: BTreeMap::from([("content".to_string(), content.to_string())]),
    }
}

fn ingest(engine: &SearchEngine, mailbox: &str, docs: Vec<DocumentPayload>) {
    engine
        .index(&IndexRequest {
            mailbox: mailbox.to_string(),
            docs,
        })
        .unwrap();
}

fn token_query(mailbox: &str, text: &str) -> SearchRequest {
    SearchRequest {
        paging: None,
        time: None,
        request: BTreeMap::from([(
            mailbox.to_string(),
            MailboxQueryRequest {
                query: BTreeMap::from([("content".to_string(), text.to_string())]),
                ..Default::default()
            },
        )]),
    }
}

fn result_ids(engine: &SearchEngine, req: &SearchRequest) -> Vec<String> {
    engine
        .search(req)
        .unwrap()
        .docs
        .into_iter()
        .map(|hit| hit.doc.id)
        .collect()
}

#[test]
fn test_single_mailbox_and_query() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(&engine, "m1", vec![doc("a", "quick brown fox", 1000)]);

    assert_eq!(result_ids(&engine, &token_query("m1", "quick fox")), vec!["a"]);
    assert!(result_ids(&engine, &token_query("m1", "quick wolf")).is_empty());
    assert!(result_ids(&engine, &token_query("m2", "quick fox")).is_empty());
}

#[test]
fn test_exact_phrase_post_filter() {
    let dir = TempDir::new().unwrap();
    // Stemming folds "being" onto "be" so both documents carry the token.
    let mut config = test_config();
    config.tokenizer = TokenizerConfig {
        stem: true,
        ..TokenizerConfig::default()
    };
    let engine = open_engine(&dir, config);

    ingest(
        &engine,
        "m1",
        vec![
            doc("a", "to be or not to be", 1000),
            doc("b", "being or nothingness", 1000),
        ],
    );

    // Identical timestamps: indexed-id order falls back to ingest order.
    assert_eq!(result_ids(&engine, &token_query("m1", "be")), vec!["a", "b"]);

    let phrase = SearchRequest {
        request: BTreeMap::from([(
            "m1".to_string(),
            MailboxQueryRequest {
                exact: BTreeMap::from([("content".to_string(), "to be".to_string())]),
                ..Default::default()
            },
        )]),
        ..Default::default()
    };
    assert_eq!(result_ids(&engine, &phrase), vec!["a"]);
}

#[test]
fn test_pagination_cursor() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(
        &engine,
        "m1",
        vec![
            doc("a", "shared token", 1000),
            doc("b", "shared token", 2000),
            doc("c", "shared token", 3000),
        ],
    );

    let mut req = token_query("m1", "shared");
    req.paging = Some(Paging {
        next_document_id: None,
        max_number: Some(2),
    });

    let page1 = engine.search(&req).unwrap();
    assert_eq!(page1.docs.len(), 2);
    assert_eq!(page1.docs[0].doc.id, "a");
    assert_eq!(page1.docs[1].doc.id, "b");
    assert!(!page1.completed);

    req.paging = Some(Paging {
        next_document_id: Some(page1.next_document_id.to_string()),
        max_number: Some(2),
    });
    let page2 = engine.search(&req).unwrap();
    assert_eq!(page2.docs.len(), 1);
    assert_eq!(page2.docs[0].doc.id, "c");
    assert!(page2.completed);
}

#[test]
fn test_time_range_bounds() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(
        &engine,
        "m1",
        vec![doc("old", "marker", 1000), doc("new", "marker", 2000)],
    );

    let mut req = token_query("m1", "marker");
    req.time = Some(TimeRange {
        start: Some(1500),
        end: None,
    });
    assert_eq!(result_ids(&engine, &req), vec!["new"]);

    req.time = Some(TimeRange {
        start: None,
        end: Some(1500),
    });
    assert_eq!(result_ids(&engine, &req), vec!["old"]);
}

#[test]
fn test_reingest_same_external_id() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(&engine, "m1", vec![doc("dup", "alpha beta", 1000)]);
    ingest(&engine, "m1", vec![doc("dup", "gamma delta", 2000)]);

    // Both ingests remain searchable as independent documents.
    let first = engine.search(&token_query("m1", "alpha")).unwrap();
    assert_eq!(first.docs.len(), 1);
    let second = engine.search(&token_query("m1", "gamma")).unwrap();
    assert_eq!(second.docs.len(), 1);
    assert_ne!(
        first.docs[0].doc.indexed_id,
        second.docs[0].doc.indexed_id
    );

    // The secondary index points at the most recent put.
    let resolved = engine.resolve("dup").unwrap();
    assert_eq!(resolved, second.docs[0].doc.indexed_id);

    // The first document is still reachable by its own indexed id.
    let old = engine.document(&first.docs[0].doc.indexed_id).unwrap();
    assert_eq!(old.content.content, "alpha beta");
}

#[test]
fn test_shard_boundary_straddle() {
    let dir = TempDir::new().unwrap();
    // Ten fresh-store sequences (0..=9) straddle exactly one boundary with
    // five postings per shard.
    let engine = open_engine(&dir, test_config().with_tokens_shard_size(5));

    let docs: Vec<DocumentPayload> = (0..10)
        .map(|i| doc(&format!("d{}", i), "straddle", 1000 + i))
        .collect();
    ingest(&engine, "m1", docs);

    let opts = engine.store().options();
    let shard_key = maildex::index::keys::token_shard_key(opts, "m1", "content", "straddle");
    assert_eq!(engine.store().get_shards(shard_key.as_bytes()), vec![0, 1]);

    let ids = result_ids(&engine, &token_query("m1", "straddle"));
    let expected: Vec<String> = (0..10).map(|i| format!("d{}", i)).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_union_across_mailboxes_accumulates_relevance() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(&engine, "inbox", vec![doc("x", "common word", 1000)]);
    ingest(&engine, "archive", vec![doc("y", "common word", 2000)]);

    let req = SearchRequest {
        request: BTreeMap::from([
            (
                "inbox".to_string(),
                MailboxQueryRequest {
                    query: BTreeMap::from([("content".to_string(), "common".to_string())]),
                    ..Default::default()
                },
            ),
            (
                "archive".to_string(),
                MailboxQueryRequest {
                    query: BTreeMap::from([("content".to_string(), "common".to_string())]),
                    ..Default::default()
                },
            ),
        ]),
        ..Default::default()
    };

    let result = engine.search(&req).unwrap();
    assert_eq!(result.docs.len(), 2);
    assert!(result.completed);
    assert_eq!(result.docs[0].doc.id, "x");
    assert_eq!(result.docs[1].doc.id, "y");
    assert!(result.docs.iter().all(|hit| hit.relevance == 1));
}

#[test]
fn test_negation_rejects_candidates() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(
        &engine,
        "m1",
        vec![
            doc("keep", "fresh news today", 1000),
            doc("drop", "fresh spam today", 2000),
        ],
    );

    let req = SearchRequest {
        request: BTreeMap::from([(
            "m1".to_string(),
            MailboxQueryRequest {
                query: BTreeMap::from([("content".to_string(), "fresh".to_string())]),
                negation: BTreeMap::from([("content".to_string(), "spam".to_string())]),
                ..Default::default()
            },
        )]),
        ..Default::default()
    };

    assert_eq!(result_ids(&engine, &req), vec!["keep"]);
}

#[test]
fn test_empty_query_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(&engine, "m1", vec![doc("a", "something", 1000)]);

    let req = SearchRequest {
        request: BTreeMap::from([("m1".to_string(), MailboxQueryRequest::default())]),
        ..Default::default()
    };
    let result = engine.search(&req).unwrap();
    assert!(result.docs.is_empty());
    assert!(result.completed);
}
