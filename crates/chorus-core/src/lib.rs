//! Core data model and error definitions for the Chorus orchestrator.
//!
//! This crate provides the foundational types shared across all Chorus
//! crates: the Task/Decomposition/Agent/Evaluation data model, the
//! conversation-message tagged union, and the unified error type.
//!
//! # Main types
//!
//! - [`ChorusError`] / [`ChorusResult`] — unified error handling.
//! - [`Task`] / [`TaskStatus`] / [`Priority`] — the Supervisor's data model.
//! - [`Decomposition`] / [`Subtask`] — the decomposition LLM's output.
//! - [`AgentConfig`] / [`AgentRole`] / [`AgentStatus`] / [`AgentReport`] — the Engine's data model.
//! - [`Message`] / [`ToolCall`] / [`ToolResult`] — the MCP's conversation buffer.
//! - [`AgentEvaluation`] / [`SystemEvaluation`] / [`Rating`] — the Evaluator's output.
//! - [`CancellationToken`] — cooperative cancellation for in-flight runs.

mod agent;
mod cancellation;
mod decomposition;
mod error;
mod evaluation;
mod message;
mod task;

pub use agent::{AgentConfig, AgentReport, AgentRole, AgentStats, AgentStatus};
pub use cancellation::CancellationToken;
pub use decomposition::{Decomposition, Subtask};
pub use error::{ChorusError, ChorusResult};
pub use evaluation::{AgentEvaluation, Rating, SystemEvaluation};
pub use message::{Message, ToolCall, ToolResponseEntry, ToolResult};
pub use task::{Priority, Task, TaskStatus};
