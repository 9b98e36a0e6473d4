//! In-process [`DocumentStore`] used by tests and dry runs.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`; documents keep
//! insertion order so child streams are reproducible.

use std::{
    collections::{HashMap, HashSet},
    sync::RwLock,
};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use indexmap::IndexMap;

use super::store::{
    apply_write, check_capacity, child_path, Document, DocumentStore, ItemResult, WriteOp,
};
use crate::error::{PipelineError, Result};

pub struct MemoryStore {
    collections: RwLock<HashMap<String, IndexMap<String, Document>>>,
    max_batch: usize,
    /// Writes to these ids fail individually inside a batch.
    rejected_ids: HashSet<String>,
    batch_calls: RwLock<Vec<usize>>,
}

impl MemoryStore {
    pub fn new(max_batch: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_batch,
            rejected_ids: HashSet::new(),
            batch_calls: RwLock::new(Vec::new()),
        }
    }

    /// Make every batched write for `ids` fail, for exercising partial failures.
    pub fn rejecting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sizes of the batches committed so far, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of documents in a collection path.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, IndexMap::len))
            .unwrap_or(0)
    }

    fn write(&self, collection: &str, id: &str, fields: Document, merge: bool) -> Result<()> {
        let mut guard = self.collections.write().map_err(poisoned)?;
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(current) => {
                let previous = std::mem::take(current);
                *current = apply_write(Some(previous), fields, merge);
            }
            None => {
                docs.insert(id.to_string(), apply_write(None, fields, merge));
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(500)
    }
}

fn poisoned<T>(_: T) -> PipelineError {
    PipelineError::Store("memory store lock poisoned".into())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let guard = self.collections.read().map_err(poisoned)?;
        Ok(guard.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) -> Result<()> {
        self.write(collection, id, fields, merge)
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<ItemResult>> {
        check_capacity(ops.len(), self.max_batch)?;
        self.batch_calls
            .write()
            .map_err(poisoned)?
            .push(ops.len());
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            if self.rejected_ids.contains(&op.id) {
                results.push(ItemResult::failed(&op, "write rejected by store"));
                continue;
            }
            match self.write(&op.collection, &op.id, op.fields.clone(), op.merge) {
                Ok(()) => results.push(ItemResult::ok(&op)),
                Err(err) => results.push(ItemResult::failed(&op, err.to_string())),
            }
        }
        Ok(results)
    }

    fn stream_children(
        &self,
        collection: &str,
        id: &str,
        sub: &str,
    ) -> BoxStream<'static, Result<Document>> {
        let path = child_path(collection, id, sub);
        let docs: Result<Vec<Document>> = self
            .collections
            .read()
            .map_err(poisoned)
            .map(|guard| {
                guard
                    .get(&path)
                    .map(|docs| docs.values().cloned().collect())
                    .unwrap_or_default()
            });
        match docs {
            Ok(docs) => stream::iter(docs.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }
}
