//! The Agent Runtime: drives one agent's MCP↔tool loop to a terminal
//! report, plus the LLM backend/failover stack it runs on (spec §4.3).
//!
//! Provider selection, retry, and failover live here; the bounded
//! conversation buffer and the `LlmBackend` seam itself live in
//! `chorus-mcp`, which this crate implements concrete backends against.
//!
//! # Main types
//!
//! - [`AgentRuntime`] — drives one agent's tool loop to completion and persists the result.
//! - [`ModelConfig`] / [`LlmProvider`] — per-agent model selection.
//! - [`LlmClient`] — the failover-wrapped `LlmBackend` an agent is configured with.
//! - [`FailoverBackend`] / [`RetryPolicy`] — cross-backend retry and failover.
//! - [`ClaudeBackend`] / [`OpenAiBackend`] — concrete provider backends.

/// Concrete LLM provider backends.
pub mod backends;
/// Model and provider configuration.
pub mod config;
/// Failover and retry logic for LLM backends.
pub mod failover;
/// LLM client factory wrapping provider selection and failover.
pub mod llm;
/// The Agent Runtime: the MCP↔tool loop and its persistence.
pub mod runner;

pub use backends::{ClaudeBackend, OpenAiBackend};
pub use config::{LlmProvider, ModelConfig};
pub use failover::{FailoverBackend, RetryPolicy};
pub use llm::LlmClient;
pub use runner::{AgentRuntime, MAX_TOOL_LOOPS};
