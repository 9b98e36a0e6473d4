//! Document store abstraction shared by the pipeline and the HTTP layer.
//!
//! Documents are JSON objects addressed by `(collection, id)`; child collections
//! hang off a parent document (`products/{asin}/reviews/{id}`). Batched writes are
//! capped by the backend and every item reports its own outcome.

use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

pub type Document = Map<String, Value>;

/// One pending write inside a batch.
#[derive(Debug, Clone)]
pub struct WriteOp {
    /// Slash separated collection path, e.g. `products/B000000001/reviews`.
    pub collection: String,
    pub id: String,
    pub fields: Document,
    pub merge: bool,
}

impl WriteOp {
    pub fn merge(collection: impl Into<String>, id: impl Into<String>, fields: Document) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            fields,
            merge: true,
        }
    }
}

/// Outcome of a single write inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub collection: String,
    pub id: String,
    pub error: Option<String>,
}

impl ItemResult {
    pub fn ok(op: &WriteOp) -> Self {
        Self {
            collection: op.collection.clone(),
            id: op.id.clone(),
            error: None,
        }
    }

    pub fn failed(op: &WriteOp, error: impl Into<String>) -> Self {
        Self {
            collection: op.collection.clone(),
            id: op.id.clone(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or overwrite a document; with `merge` only the given top-level fields change.
    async fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) -> Result<()>;

    /// Commit one batch. Batches above [`DocumentStore::max_batch_size`] are rejected
    /// with [`PipelineError::Capacity`] before anything is written.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<ItemResult>>;

    /// Lazily yield every document of `collection/id/sub`.
    fn stream_children(
        &self,
        collection: &str,
        id: &str,
        sub: &str,
    ) -> BoxStream<'static, Result<Document>>;

    fn max_batch_size(&self) -> usize;

    /// Fresh 20 character document id.
    fn new_id(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect()
    }
}

/// Reject a batch larger than the backend accepts.
pub fn check_capacity(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(PipelineError::Capacity { size, limit });
    }
    Ok(())
}

/// Path of a child collection under a parent document.
pub fn child_path(collection: &str, id: &str, sub: &str) -> String {
    format!("{collection}/{id}/{sub}")
}

/// Serialize a record into a document, failing on non-object shapes.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::validation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Per-item outcome of a chunked write.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub batches: usize,
    pub results: Vec<ItemResult>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }
}

/// Split `ops` into sub-batches no larger than the store limit and commit each.
///
/// A sub-batch whose commit fails as a whole marks each of its items failed;
/// later sub-batches are still attempted.
pub async fn write_in_batches(store: &dyn DocumentStore, ops: Vec<WriteOp>) -> BatchReport {
    let limit = store.max_batch_size().max(1);
    let mut report = BatchReport::default();
    let mut ops = ops.into_iter().peekable();
    while ops.peek().is_some() {
        let chunk: Vec<WriteOp> = ops.by_ref().take(limit).collect();
        report.batches += 1;
        let keys: Vec<WriteOp> = chunk
            .iter()
            .map(|op| WriteOp {
                fields: Document::new(),
                ..op.clone()
            })
            .collect();
        match store.batch_write(chunk).await {
            Ok(results) => {
                debug!(batch = report.batches, items = results.len(), "committed batch");
                report.results.extend(results);
            }
            Err(err) => {
                warn!(batch = report.batches, %err, "batch commit failed");
                let msg = err.to_string();
                report
                    .results
                    .extend(keys.iter().map(|op| ItemResult::failed(op, msg.clone())));
            }
        }
    }
    report
}

/// Apply a write to an existing document the way every backend does.
pub(crate) fn apply_write(existing: Option<Document>, fields: Document, merge: bool) -> Document {
    match (existing, merge) {
        (Some(mut current), true) => {
            current.extend(fields);
            current
        }
        _ => fields,
    }
}
