//! Storage-level invariants: round-trips, posting-list canonical form,
//! shard-directory completeness, sequence monotonicity across restarts,
//! pagination laws.

use std::collections::BTreeMap;

use maildex::codec::{self, PostingRecord, RecordKind, ShardSetRecord};
use maildex::index::keys;
use maildex::models::{
    Content, DocumentPayload, IndexRequest, MailboxQueryRequest, Paging, SearchRequest, TimeSpec,
};
use maildex::store::{ColumnFamily, WriteBatch};
use maildex::{Config, IndexedId, OpenMode, SearchEngine};
use tempfile::TempDir;

fn open_engine(dir: &TempDir, config: Config) -> SearchEngine {
    SearchEngine::open(dir.path(), OpenMode::ReadWrite, config).unwrap()
}

fn test_config() -> Config {
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
        request: BTreeMap::from([(
            mailbox.to_string(),
            MailboxQueryRequest {
                query: BTreeMap::from([("content".to_string(), text.to_string())]),
                ..Default::default()
            },
        )]),
        ..Default::default()
    }
}

#[test]
fn test_document_roundtrip() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    let mut payload = doc("round-1", "alpha beta", 1234);
    payload.content = Some(Content {
        title: "a title".to_string(),
        content: "alpha beta".to_string(),
        links: vec!["http://example.com".to_string()],
        images: vec!["img.png".to_string()],
    });
    ingest(&engine, "m1", vec![payload]);

    let id = engine.resolve("round-1").unwrap();
    let loaded = engine.document(&id).unwrap();

    assert_eq!(loaded.mailbox, "m1");
    assert_eq!(loaded.id, "round-1");
    assert_eq!(loaded.indexed_id, id);
    assert_eq!(loaded.author, "tester");
    assert_eq!(loaded.content.title, "a title");
    assert_eq!(loaded.content.links, vec!["http://example.com"]);
    assert_eq!(loaded.indexed_id.timestamp(), (1234, 0));

    assert!(engine.resolve("missing").unwrap_err().is_not_found());
}

#[test]
fn test_posting_lists_sorted_unique() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    let docs: Vec<DocumentPayload> = (0..6)
        .map(|i| doc(&format!("d{}", i), "word word word", 1000 + i))
        .collect();
    ingest(&engine, "m1", docs);

    let store = engine.store();
    let base = keys::posting_base_key(store.options(), "m1", "content", "word");
    let key = keys::posting_shard_key(&base, 0);

    let ids = store.get_posting_list(key.as_bytes()).unwrap();
    assert_eq!(ids.len(), 6);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    // Canonical form survives compaction.
    engine.compact().unwrap();
    assert_eq!(store.get_posting_list(key.as_bytes()).unwrap(), ids);
}

#[test]
fn test_shard_directory_completeness() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config().with_tokens_shard_size(2));

    let docs: Vec<DocumentPayload> = (0..5)
        .map(|i| doc(&format!("d{}", i), "word", 1000 + i))
        .collect();
    ingest(&engine, "m1", docs);

    let store = engine.store();
    let opts = store.options();
    let shard_key = keys::token_shard_key(opts, "m1", "content", "word");
    let shards = store.get_shards(shard_key.as_bytes());
    assert_eq!(shards, vec![0, 1, 2]);

    // Every listed shard holds postings; nothing lives outside the
    // directory.
    let base = keys::posting_base_key(opts, "m1", "content", "word");
    for &shard in &shards {
        let key = keys::posting_shard_key(&base, shard);
        assert!(!store.get_posting_list(key.as_bytes()).unwrap().is_empty());
    }
    let outside = keys::posting_shard_key(&base, 3);
    assert!(store.get_posting_list(outside.as_bytes()).unwrap().is_empty());
}

#[test]
fn test_sequence_monotonic_across_restart() {
    let dir = TempDir::new().unwrap();

    {
        let engine = open_engine(&dir, test_config());
        ingest(
            &engine,
            "m1",
            vec![
                doc("a", "one", 1000),
                doc("b", "two", 1000),
                doc("c", "three", 1000),
            ],
        );
        assert_eq!(engine.store().sequence(), 3);
    }

    let engine = open_engine(&dir, test_config());
    // Restart resumes from the persisted reservation, past everything
    // ever consumed.
    assert!(engine.store().sequence() >= 3);

    ingest(&engine, "m1", vec![doc("d", "four", 1000)]);
    let result = engine.search(&token_query("m1", "four")).unwrap();
    assert_eq!(result.docs.len(), 1);
    assert!(result.docs[0].doc.indexed_id.seq > 2);
}

#[test]
fn test_time_ordering_of_ids() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(
        &engine,
        "m1",
        vec![doc("early", "tick", 1000), doc("late", "tick", 2000)],
    );

    let early = engine.resolve("early").unwrap();
    let late = engine.resolve("late").unwrap();
    assert!(early < late);
}

#[test]
fn test_pagination_idempotence() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    let docs: Vec<DocumentPayload> = (0..5)
        .map(|i| doc(&format!("d{}", i), "page", 1000 + i))
        .collect();
    ingest(&engine, "m1", docs);

    let unpaged: Vec<String> = engine
        .search(&token_query("m1", "page"))
        .unwrap()
        .docs
        .into_iter()
        .map(|hit| hit.doc.id)
        .collect();
    assert_eq!(unpaged.len(), 5);

    let mut paged: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut req = token_query("m1", "page");
        req.paging = Some(Paging {
            next_document_id: cursor.clone(),
            max_number: Some(2),
        });
        let page = engine.search(&req).unwrap();
        for hit in &page.docs {
            // No overlap between pages.
            assert!(!paged.contains(&hit.doc.id));
            paged.push(hit.doc.id.clone());
        }
        if page.completed {
            break;
        }
        cursor = Some(page.next_document_id.to_string());
    }

    assert_eq!(paged, unpaged);
}

#[test]
fn test_dangling_posting_skipped() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    ingest(&engine, "m1", vec![doc("real", "ghost story", 1000)]);

    // Register a posting whose document body was never written.
    let store = engine.store();
    let opts = store.options();
    let phantom = IndexedId::new(1500, 0, 999, 7);
    let base = keys::posting_base_key(opts, "m1", "content", "ghost");
    let mut batch = WriteBatch::new();
    batch.merge(
        keys::posting_shard_key(&base, 0),
        codec::encode_record(RecordKind::Posting, &PostingRecord { id: phantom }).unwrap(),
    );
    batch.merge(
        keys::token_shard_key(opts, "m1", "content", "ghost"),
        codec::encode_record(RecordKind::ShardSet, &ShardSetRecord { shards: vec![0] }).unwrap(),
    );
    store.write(&batch).unwrap();

    let result = engine.search(&token_query("m1", "ghost")).unwrap();
    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.docs[0].doc.id, "real");
    assert!(result.completed);
}

#[test]
fn test_compaction_collapses_queued_merges() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    let docs: Vec<DocumentPayload> = (0..4)
        .map(|i| doc(&format!("d{}", i), "squash", 1000 + i))
        .collect();
    ingest(&engine, "m1", docs);

    let store = engine.store();
    let base = keys::posting_base_key(store.options(), "m1", "content", "squash");
    let key = keys::posting_shard_key(&base, 0);

    // Four merges queued as four frames before compaction.
    let frame_count = |store: &maildex::Store, key: &[u8]| -> usize {
        let iter = store.iter(ColumnFamily::Indexes, Some(key));
        assert_eq!(iter.key(), Some(key), "posting cell must exist");
        let cell = iter.value().unwrap().to_vec();
        codec::split_frames(key, &cell).unwrap().len()
    };
    assert_eq!(frame_count(store, key.as_bytes()), 4);

    engine.compact().unwrap();
    assert_eq!(frame_count(store, key.as_bytes()), 1);

    // Reads are unchanged by canonicalization.
    let ids = store.get_posting_list(key.as_bytes()).unwrap();
    assert_eq!(ids.len(), 4);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let result = engine.search(&token_query("m1", "squash")).unwrap();
    assert_eq!(result.docs.len(), 4);
}

#[test]
fn test_merge_on_foreign_prefix_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, test_config());

    let mut batch = WriteBatch::new();
    batch.merge(
        "documents.00ff",
        codec::encode_record(RecordKind::ShardSet, &ShardSetRecord { shards: vec![0] }).unwrap(),
    );
    let err = engine.store().write(&batch).unwrap_err();
    assert!(matches!(err, maildex::MaildexError::Internal(_)));
}
