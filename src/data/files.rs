//! File-backed [`DocumentStore`]: one JSON file per document under `data/store/`.
//!
//! Layout mirrors the document paths: `products/B000000001.json` for the
//! product, `products/B000000001/reviews/<id>.json` for its reviews. Ids are
//! URL-encoded so arbitrary ids map onto safe file names.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info};
use urlencoding::encode;

use super::store::{apply_write, check_capacity, Document, DocumentStore, ItemResult, WriteOp};
use crate::{config::Settings, error::Result};

pub struct FileStore {
    root: PathBuf,
    max_batch: usize,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, max_batch: usize) -> Self {
        Self {
            root: root.into(),
            max_batch,
        }
    }

    /// Open the store below the configured data directory.
    pub fn open(settings: &Settings) -> Result<Self> {
        let root = settings.join_data("store");
        std::fs::create_dir_all(&root)?;
        info!(path = %root.display(), "opened file store");
        Ok(Self::new(root, settings.store_batch_limit))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        collection
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| {
                path.join(encode(segment).as_ref())
            })
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", encode(id)))
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let path = self.doc_path(collection, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, collection: &str, id: &str, fields: Document, merge: bool) -> Result<()> {
        let existing = if merge {
            self.read(collection, id).await?
        } else {
            None
        };
        let doc = apply_write(existing, fields, merge);
        let path = self.doc_path(collection, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&doc)?;
        // write-then-rename keeps readers from seeing half written files
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "wrote document");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.read(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Document, merge: bool) -> Result<()> {
        self.write(collection, id, fields, merge).await
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<Vec<ItemResult>> {
        check_capacity(ops.len(), self.max_batch)?;
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match self
                .write(&op.collection, &op.id, op.fields.clone(), op.merge)
                .await
            {
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
        let dir = self
            .collection_dir(collection)
            .join(encode(id).as_ref())
            .join(encode(sub).as_ref());
        stream::try_unfold((dir, None), |(dir, entries)| next_child(dir, entries))
            .boxed()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }
}

type ChildCursor = (PathBuf, Option<tokio::fs::ReadDir>);

async fn next_child(
    dir: PathBuf,
    entries: Option<tokio::fs::ReadDir>,
) -> Result<Option<(Document, ChildCursor)>> {
    let mut entries = match entries {
        Some(entries) => entries,
        None => match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        },
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let bytes = tokio::fs::read(&path).await?;
        let doc: Document = serde_json::from_slice(&bytes)?;
        return Ok(Some((doc, (dir, Some(entries)))));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use serde_json::json;

    use super::*;
    use crate::data::store::to_document;

    #[tokio::test]
    async fn documents_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), 10);
        let doc = to_document(&json!({ "asin": "B000000001", "details": { "title": "Lamp" } }))
            .unwrap();
        store.set("products", "B000000001", doc, false).await.unwrap();

        let reopened = FileStore::new(dir.path(), 10);
        let loaded = reopened.get("products", "B000000001").await.unwrap().unwrap();
        assert_eq!(loaded["details"]["title"], "Lamp");
    }

    #[tokio::test]
    async fn merge_updates_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), 10);
        let base = to_document(&json!({ "id": "r1", "review": "fine", "rating": 3 })).unwrap();
        store.set("products/B000000001/reviews", "r1", base, false).await.unwrap();
        let patch = to_document(&json!({ "cluster": 1 })).unwrap();
        store.set("products/B000000001/reviews", "r1", patch, true).await.unwrap();

        let doc = store
            .get("products/B000000001/reviews", "r1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["review"], "fine");
        assert_eq!(doc["cluster"], 1);
    }

    #[tokio::test]
    async fn streams_children_and_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), 10);
        for id in ["a/1", "b 2"] {
            let doc = to_document(&json!({ "id": id })).unwrap();
            store
                .set("products/B000000001/reviews", id, doc, false)
                .await
                .unwrap();
        }
        let mut ids: Vec<String> = store
            .stream_children("products", "B000000001", "reviews")
            .map_ok(|doc| doc["id"].as_str().unwrap_or_default().to_string())
            .try_collect()
            .await
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a/1".to_string(), "b 2".to_string()]);

        let none: Vec<Document> = store
            .stream_children("products", "B000000009", "reviews")
            .try_collect()
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
