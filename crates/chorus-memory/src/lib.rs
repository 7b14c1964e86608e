//! Vector Store Gateway and Agent Memory (spec §4.6, §4.8).
//!
//! The gateway is an opaque, collection-scoped embedding/metadata store
//! with semantic query support, matching the external vector store
//! contract of spec §6: four fixed collections (`tasks`,
//! `agent_executions`, `knowledge_base`, `agent_memory`), add/query/count
//! operations, and `score = 1 - distance` similarity. [`AgentMemory`] is a
//! narrow facade over the `agent_memory` collection for an agent's
//! long-term episodic store.
//!
//! # Main types
//!
//! - [`VectorStoreGateway`] — the gateway trait.
//! - [`InMemoryVectorStore`] — brute-force cosine-similarity in-process implementation.
//! - [`FileVectorStore`] — JSONL/JSON snapshot-backed implementation for local development.
//! - [`EmbeddingProvider`] / [`LocalEmbedding`] — the embedding step (an external LLM collaborator in production, local+deterministic here for testability).
//! - [`AgentMemory`] — the long-term episodic store facade used by the Agent Runtime.

/// Long-term episodic memory facade over the `agent_memory` collection.
pub mod agent_memory;
/// Embedding provider trait and a deterministic local implementation.
pub mod embedding;
/// File-backed [`VectorStoreGateway`] implementation.
pub mod persistence;
/// Vector store gateway trait and in-memory implementation.
pub mod store;

pub use agent_memory::{
    AgentMemory, EpisodicRecord, AGENT_EXECUTIONS_COLLECTION, AGENT_MEMORY_COLLECTION,
    KNOWLEDGE_BASE_COLLECTION, TASKS_COLLECTION,
};
pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use persistence::FileVectorStore;
pub use store::{InMemoryVectorStore, MetadataFilter, SearchResult, VectorRecord, VectorStoreGateway};
