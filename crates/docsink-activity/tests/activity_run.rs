//! End-to-end runs of the activity loop against in-memory fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use docsink_activity::activity::{execute, RunSummary};
use docsink_activity::docstore::DocumentStore;
use docsink_activity::storage::{BlobEntry, BlobPage, BlobSource, EMPTY_FOLDER_MARKER};
use docsink_common::{DocsinkError, Result};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Fake blob source serving a fixed set of pages.
struct MemBlobSource {
    pages: Vec<Vec<(String, Vec<u8>)>>,
    fetches: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MemBlobSource {
    fn new(pages: Vec<Vec<(&str, &[u8])>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| {
                    page.into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_vec()))
                        .collect()
                })
                .collect(),
            fetches: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    fn single_page(objects: Vec<(&str, &[u8])>) -> Self {
        Self::new(vec![objects])
    }

    fn fetched_keys(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobSource for MemBlobSource {
    async fn list_page(&self, cursor: Option<&str>) -> Result<BlobPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let index = match cursor {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DocsinkError::Storage(format!("bad cursor: {token}")))?,
        };

        let entries = self
            .pages
            .get(index)
            .map(|page| {
                page.iter()
                    .map(|(key, payload)| BlobEntry {
                        key: key.clone(),
                        size: payload.len() as i64,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let next = if index + 1 < self.pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };

        Ok(BlobPage { entries, next })
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.fetches.lock().unwrap().push(key.to_string());
        self.pages
            .iter()
            .flatten()
            .find(|(k, _)| k == key)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| DocsinkError::Storage(format!("no such object: {key}")))
    }
}

/// Fake document store with optional write-failure injection.
#[derive(Default)]
struct MemDocumentStore {
    docs: Mutex<HashMap<String, Value>>,
    fail_on: Option<String>,
}

impl MemDocumentStore {
    fn with_document(id: &str, body: Value) -> Self {
        let store = Self::default();
        store.docs.lock().unwrap().insert(id.to_string(), body);
        store
    }

    fn failing_on(id: &str) -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            fail_on: Some(id.to_string()),
        }
    }

    fn get(&self, id: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    fn check_fail(&self, id: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(id) {
            return Err(DocsinkError::Document(format!("write failed for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemDocumentStore {
    async fn id_exists(&self, id: &str) -> Result<bool> {
        Ok(self.docs.lock().unwrap().contains_key(id))
    }

    async fn replace(&self, id: &str, body: &Value) -> Result<()> {
        self.check_fail(id)?;
        self.docs
            .lock()
            .unwrap()
            .insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn create(&self, id: &str, body: &Value) -> Result<()> {
        self.check_fail(id)?;
        self.docs
            .lock()
            .unwrap()
            .insert(id.to_string(), body.clone());
        Ok(())
    }
}

async fn run(source: &MemBlobSource, store: &MemDocumentStore) -> Result<RunSummary> {
    execute(source, store, &HashMap::new(), CancellationToken::new()).await
}

#[tokio::test]
async fn single_object_into_empty_collection_is_created() {
    let source =
        MemBlobSource::single_page(vec![("ingest/batch.json", br#"{"id":"x1","v":1}"#.as_slice())]);
    let store = MemDocumentStore::default();

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.replaced, 0);
    assert_eq!(store.get("x1"), Some(json!({"id":"x1","v":1})));
}

#[tokio::test]
async fn existing_document_is_replaced_with_new_content() {
    let source =
        MemBlobSource::single_page(vec![("ingest/batch.json", br#"{"id":"x1","v":2}"#.as_slice())]);
    let store = MemDocumentStore::with_document("x1", json!({"id":"x1","v":1}));

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.replaced, 1);
    assert_eq!(store.get("x1"), Some(json!({"id":"x1","v":2})));
}

#[tokio::test]
async fn marker_objects_are_never_fetched_or_decoded() {
    let marker_key = format!("ingest/{EMPTY_FOLDER_MARKER}");
    let source = MemBlobSource::single_page(vec![
        (marker_key.as_str(), b"".as_slice()),
        ("ingest/real.json", br#"{"id":"x1"}"#.as_slice()),
    ]);
    let store = MemDocumentStore::default();

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary.blobs, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(source.fetched_keys(), vec!["ingest/real.json"]);
}

#[tokio::test]
async fn invalid_json_aborts_before_any_write() {
    let source =
        MemBlobSource::single_page(vec![("ingest/broken.json", b"{not json".as_slice())]);
    let store = MemDocumentStore::default();

    let err = run(&source, &store).await.unwrap_err();

    assert!(matches!(err, DocsinkError::Decode(_)));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn all_pages_are_drained_exactly_once() {
    let source = MemBlobSource::new(vec![
        vec![
            ("ingest/a.json", br#"{"id":"a"}"#.as_slice()),
            ("ingest/b.json", br#"{"id":"b"}"#.as_slice()),
        ],
        vec![
            ("ingest/c.json", br#"{"id":"c"}"#.as_slice()),
            ("ingest/d.json", br#"{"id":"d"}"#.as_slice()),
        ],
        vec![("ingest/e.json", br#"{"id":"e"}"#.as_slice())],
    ]);
    let store = MemDocumentStore::default();

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary.blobs, 5);
    assert_eq!(summary.created, 5);
    assert_eq!(store.len(), 5);
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 3);
    // Each object fetched exactly once, in listing order.
    assert_eq!(
        source.fetched_keys(),
        vec![
            "ingest/a.json",
            "ingest/b.json",
            "ingest/c.json",
            "ingest/d.json",
            "ingest/e.json"
        ]
    );
}

#[tokio::test]
async fn array_payload_expands_into_independent_records() {
    let payload = br#"[{"id":"a","v":1},{"id":"b","v":2},{"id":"c","v":3}]"#;
    let source = MemBlobSource::single_page(vec![("ingest/batch.json", payload.as_slice())]);
    let store = MemDocumentStore::with_document("b", json!({"id":"b","v":0}));

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary.blobs, 1);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.replaced, 1);
    assert_eq!(store.get("b"), Some(json!({"id":"b","v":2})));
}

#[tokio::test]
async fn record_without_id_aborts_but_keeps_earlier_writes() {
    let source = MemBlobSource::new(vec![vec![
        ("ingest/good.json", br#"{"id":"a","v":1}"#.as_slice()),
        ("ingest/bad.json", br#"{"v":2}"#.as_slice()),
    ]]);
    let store = MemDocumentStore::default();

    let err = run(&source, &store).await.unwrap_err();

    assert!(matches!(err, DocsinkError::Validation(_)));
    // The record already upserted before the failure is not rolled back.
    assert_eq!(store.get("a"), Some(json!({"id":"a","v":1})));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn failed_write_aborts_the_run() {
    let payload = br#"[{"id":"a"},{"id":"boom"},{"id":"c"}]"#;
    let source = MemBlobSource::single_page(vec![("ingest/batch.json", payload.as_slice())]);
    let store = MemDocumentStore::failing_on("boom");

    let err = run(&source, &store).await.unwrap_err();

    assert!(matches!(err, DocsinkError::Document(_)));
    // Processing stopped at the failing record.
    assert!(store.get("a").is_some());
    assert!(store.get("c").is_none());
}

#[tokio::test]
async fn cancellation_stops_before_the_next_upsert() {
    let source =
        MemBlobSource::single_page(vec![("ingest/batch.json", br#"{"id":"x1"}"#.as_slice())]);
    let store = MemDocumentStore::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = execute(&source, &store, &HashMap::new(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DocsinkError::Cancelled(_)));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn empty_source_folder_completes_with_empty_summary() {
    let source = MemBlobSource::single_page(vec![]);
    let store = MemDocumentStore::default();

    let summary = run(&source, &store).await.unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(source.fetched_keys().is_empty());
}

#[tokio::test]
async fn summary_properties_carry_counters_as_strings() {
    let source = MemBlobSource::single_page(vec![(
        "ingest/batch.json",
        br#"[{"id":"a"},{"id":"b"}]"#.as_slice(),
    )]);
    let store = MemDocumentStore::with_document("a", json!({"id":"a"}));

    let summary = run(&source, &store).await.unwrap();
    let properties = summary.into_properties();

    assert_eq!(properties.get("blobs").map(String::as_str), Some("1"));
    assert_eq!(properties.get("created").map(String::as_str), Some("1"));
    assert_eq!(properties.get("replaced").map(String::as_str), Some("1"));
}
