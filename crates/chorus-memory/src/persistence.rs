use async_trait::async_trait;
use chorus_core::{ChorusError, ChorusResult};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::store::{InMemoryVectorStore, MetadataFilter, SearchResult, VectorRecord, VectorStoreGateway};

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    collections: HashMap<String, Vec<VectorRecord>>,
}

/// File-backed vector store gateway, for local development only. Snapshots
/// the whole gateway to a single JSON file on every mutation and reloads
/// it on construction. Kept alongside [`InMemoryVectorStore`] as a
/// concrete second backend — not because the orchestrator's own state
/// must survive restarts (it explicitly does not), but because the
/// vector store is named in spec §6 as an external system with its own
/// persistence contract, independent of that Non-goal.
pub struct FileVectorStore {
    path: PathBuf,
    inner: InMemoryVectorStore,
    save_lock: Mutex<()>,
}

impl FileVectorStore {
    /// Opens (or creates) a file-backed gateway at `path`.
    pub async fn new(path: PathBuf) -> ChorusResult<Self> {
        let inner = InMemoryVectorStore::new();
        if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ChorusError::VectorStore(format!("failed to read snapshot: {e}")))?;
            let snapshot: Snapshot = serde_json::from_str(&data)
                .map_err(|e| ChorusError::VectorStore(format!("invalid snapshot: {e}")))?;
            for (collection, records) in snapshot.collections {
                inner.get_or_create_collection(&collection).await?;
                if !records.is_empty() {
                    let (ids, embeddings, metadatas, documents) = records.into_iter().fold(
                        (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
                        |mut acc, r| {
                            acc.0.push(r.id);
                            acc.1.push(r.embedding);
                            acc.2.push(r.metadata);
                            acc.3.push(r.document);
                            acc
                        },
                    );
                    inner.add(&collection, ids, embeddings, metadatas, documents).await?;
                }
            }
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChorusError::VectorStore(format!("failed to create dir: {e}")))?;
        }
        Ok(Self {
            path,
            inner,
            save_lock: Mutex::new(()),
        })
    }

    async fn save(&self) -> ChorusResult<()> {
        let _guard = self.save_lock.lock().await;
        let snapshot = Snapshot {
            collections: self.inner.snapshot().await,
        };
        let data = serde_json::to_string(&snapshot)
            .map_err(|e| ChorusError::VectorStore(format!("failed to serialize snapshot: {e}")))?;
        tokio::fs::write(&self.path, data.as_bytes())
            .await
            .map_err(|e| ChorusError::VectorStore(format!("failed to write snapshot: {e}")))?;
        Ok(())
    }

    #[cfg(test)]
    fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl VectorStoreGateway for FileVectorStore {
    async fn get_or_create_collection(&self, collection: &str) -> ChorusResult<()> {
        self.inner.get_or_create_collection(collection).await
    }

    async fn add(
        &self,
        collection: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<HashMap<String, serde_json::Value>>,
        documents: Vec<Option<String>>,
    ) -> ChorusResult<()> {
        self.inner
            .add(collection, ids, embeddings, metadatas, documents)
            .await?;
        self.save().await
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        where_: Option<MetadataFilter>,
    ) -> ChorusResult<Vec<SearchResult>> {
        self.inner.query(collection, embedding, n_results, where_).await
    }

    async fn count(&self, collection: &str) -> ChorusResult<usize> {
        self.inner.count(collection).await
    }
}
