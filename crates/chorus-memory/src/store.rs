use async_trait::async_trait;
use chorus_core::{ChorusError, ChorusResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One record stored in a [`VectorStoreGateway`] collection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorRecord {
    /// Caller-assigned id, unique within its collection.
    pub id: String,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// Arbitrary key/value metadata, matched by [`MetadataFilter`].
    pub metadata: HashMap<String, serde_json::Value>,
    /// Optional source document text.
    pub document: Option<String>,
}

/// One hit from [`VectorStoreGateway::query`]. `score = 1 - distance`
/// (spec §6), i.e. higher is more similar.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched record.
    pub record: VectorRecord,
    /// Similarity score, `1 - distance`.
    pub score: f32,
}

/// Exact-match AND filter over a record's metadata, answering the
/// `where?` parameter of spec §6's `query` operation.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter(pub HashMap<String, serde_json::Value>);

impl MetadataFilter {
    /// Builds a filter from key/value pairs.
    pub fn new(pairs: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Whether `metadata` satisfies every key/value pair in this filter.
    pub fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        self.0.iter().all(|(k, v)| metadata.get(k) == Some(v))
    }
}

/// The Vector Store Gateway (spec §6 "Vector store interface"): an
/// opaque, collection-scoped embedding/metadata store with semantic
/// query support. Four fixed collections are used throughout the
/// orchestrator: `tasks`, `agent_executions`, `knowledge_base`,
/// `agent_memory`.
#[async_trait]
pub trait VectorStoreGateway: Send + Sync {
    /// Ensures `collection` exists, creating it empty if necessary.
    async fn get_or_create_collection(&self, collection: &str) -> ChorusResult<()>;

    /// Adds records to `collection`. `ids`, `embeddings`, `metadatas`, and
    /// `documents` must be the same length; `documents[i]` may be absent.
    async fn add(
        &self,
        collection: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<HashMap<String, serde_json::Value>>,
        documents: Vec<Option<String>>,
    ) -> ChorusResult<()>;

    /// Returns the `n_results` records in `collection` most similar to
    /// `embedding`, optionally restricted to records matching `where_`.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        where_: Option<MetadataFilter>,
    ) -> ChorusResult<Vec<SearchResult>>;

    /// Number of records currently stored in `collection`.
    async fn count(&self, collection: &str) -> ChorusResult<usize>;
}

struct Collection {
    records: Vec<VectorRecord>,
}

/// In-process implementation of [`VectorStoreGateway`], brute-force
/// cosine similarity per collection. Suitable as the default opaque
/// store for development and tests; a real deployment would point the
/// gateway at an external vector database instead.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Builds an empty store with no collections yet created.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots every collection's records, keyed by collection name.
    /// Used by [`crate::persistence::FileVectorStore`] to serialize state
    /// to disk.
    pub async fn snapshot(&self) -> HashMap<String, Vec<VectorRecord>> {
        let collections = self.collections.read().await;
        collections
            .iter()
            .map(|(name, coll)| (name.clone(), coll.records.clone()))
            .collect()
    }
}

#[async_trait]
impl VectorStoreGateway for InMemoryVectorStore {
    async fn get_or_create_collection(&self, collection: &str) -> ChorusResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection { records: Vec::new() });
        Ok(())
    }

    async fn add(
        &self,
        collection: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<HashMap<String, serde_json::Value>>,
        documents: Vec<Option<String>>,
    ) -> ChorusResult<()> {
        if ids.len() != embeddings.len() || ids.len() != metadatas.len() || ids.len() != documents.len() {
            return Err(ChorusError::VectorStore(
                "add() requires ids, embeddings, metadatas, and documents of equal length".into(),
            ));
        }
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection { records: Vec::new() });
        for (((id, embedding), metadata), document) in ids
            .into_iter()
            .zip(embeddings)
            .zip(metadatas)
            .zip(documents)
        {
            coll.records.retain(|r| r.id != id);
            coll.records.push(VectorRecord {
                id,
                embedding,
                metadata,
                document,
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
        where_: Option<MetadataFilter>,
    ) -> ChorusResult<Vec<SearchResult>> {
        if embedding.is_empty() {
            return Err(ChorusError::VectorStore("empty query embedding".into()));
        }
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<SearchResult> = coll
            .records
            .iter()
            .filter(|r| where_.as_ref().map(|f| f.matches(&r.metadata)).unwrap_or(true))
            .map(|r| {
                let distance = 1.0 - cosine_similarity(embedding, &r.embedding);
                SearchResult {
                    record: r.clone(),
                    score: 1.0 - distance,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> ChorusResult<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.records.len()).unwrap_or(0))
    }
}

/// Cosine similarity between two vectors of equal length; `0.0` if the
/// lengths differ or either vector is zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
