use crate::embedding::EmbeddingProvider;
use crate::store::{MetadataFilter, VectorStoreGateway};
use chorus_core::ChorusResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed collection name for submitted tasks, used by the Supervisor to
/// retrieve top-K relevant prior tasks (spec §4.3 step 2).
pub const TASKS_COLLECTION: &str = "tasks";
/// Fixed collection name for terminal agent reports (spec §4.3 step 6).
pub const AGENT_EXECUTIONS_COLLECTION: &str = "agent_executions";
/// Fixed collection name for system-level evaluations (spec §4.5).
pub const KNOWLEDGE_BASE_COLLECTION: &str = "knowledge_base";
/// Fixed collection name for an agent's long-term episodic memory (spec §4.8).
pub const AGENT_MEMORY_COLLECTION: &str = "agent_memory";

/// A single long-term memory record, written on an agent's success (the
/// task/result/reasoning triple) or error (the task/error pair), and read
/// back via similarity search on a future run (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicRecord {
    /// The subtask description this memory concerns.
    pub task: String,
    /// The agent's result, when the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The agent's reasoning, when the run succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// The error message, when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EpisodicRecord {
    /// Builds a success record.
    pub fn success(task: impl Into<String>, result: serde_json::Value, reasoning: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            result: Some(result),
            reasoning: Some(reasoning.into()),
            error: None,
        }
    }

    /// Builds an error record.
    pub fn failure(task: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            result: None,
            reasoning: None,
            error: Some(error.into()),
        }
    }

    /// Text used to embed this record for later similarity search.
    fn embeddable_text(&self) -> String {
        match (&self.reasoning, &self.error) {
            (Some(reasoning), _) => format!("{}\n{}", self.task, reasoning),
            (None, Some(error)) => format!("{}\n{}", self.task, error),
            (None, None) => self.task.clone(),
        }
    }
}

/// Narrow facade over the `agent_memory` collection of the [`VectorStoreGateway`]
/// (spec §4.8 "Agent Memory"): the long-term, embedding-backed episodic
/// store one agent writes to at the end of a run and reads from at the
/// start of the next one. The short-term K/V scratch map lives on the
/// `AgentRuntime` itself (one crate up) since it is cleared at the end of
/// a single run and never persisted.
pub struct AgentMemory {
    store: Arc<dyn VectorStoreGateway>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl AgentMemory {
    /// Builds a facade over `store`'s `agent_memory` collection, embedding
    /// new records and queries with `embedder`.
    pub fn new(store: Arc<dyn VectorStoreGateway>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Persists one episodic record for `agent_id` (spec §4.3 step 6:
    /// "on success, persist `{task, result, reasoning}`... on error,
    /// persist `{task, error}`").
    pub async fn remember(&self, agent_id: &str, record: EpisodicRecord) -> ChorusResult<()> {
        let embedding = self.embedder.embed(&record.embeddable_text()).await?;
        let mut metadata = HashMap::new();
        metadata.insert("agent_id".to_string(), serde_json::json!(agent_id));
        let document = serde_json::to_string(&record).ok();
        self.store.get_or_create_collection(AGENT_MEMORY_COLLECTION).await?;
        self.store
            .add(
                AGENT_MEMORY_COLLECTION,
                vec![uuid::Uuid::new_v4().to_string()],
                vec![embedding],
                vec![metadata],
                vec![document],
            )
            .await
    }

    /// Returns the `k` long-term memories most similar to `query`,
    /// restricted to `agent_id`'s own memories (spec §4.3 step 2: "top-K
    /// long-term memories (from Agent Memory)").
    pub async fn recall_similar(&self, agent_id: &str, query: &str, k: usize) -> ChorusResult<Vec<EpisodicRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        let filter = MetadataFilter::new([("agent_id".to_string(), serde_json::json!(agent_id))]);
        let results = self
            .store
            .query(AGENT_MEMORY_COLLECTION, &embedding, k, Some(filter))
            .await?;
        Ok(results
            .into_iter()
            .filter_map(|r| r.record.document.and_then(|d| serde_json::from_str(&d).ok()))
            .collect())
    }
}
