//! Multi-agent task orchestration: decomposes a submitted task into an
//! agent DAG, drives it to completion through parallel-group cohorts,
//! scores the results, and fans status changes out to subscribers
//! (spec §4).
//!
//! # Main types
//!
//! - [`TaskSupervisor`] — owns task state; sequences decompose → schedule → evaluate.
//! - [`WorkflowEngine`] — drives one task's agent DAG to terminal reports.
//! - [`Evaluator`] — scores per-agent and system-level outcomes, with rate-limit retry.
//! - [`GatewayEvent`] / [`AgentEvent`] — the event types subscribers observe.

/// The Workflow Engine: DAG scheduling over agent cohorts.
pub mod engine;
/// Per-agent and system-level LLM-scored evaluation.
pub mod evaluator;
/// Event and snapshot types shared by the Engine, Supervisor, and gateway.
pub mod events;
/// The Task Lifecycle Supervisor.
pub mod supervisor;

pub use engine::{EngineOutcome, EngineStatus, WorkflowEngine};
pub use evaluator::{Evaluator, EvaluatorRetryPolicy};
pub use events::{AgentEvent, AgentEventSink, AgentSnapshot, GatewayEvent, SystemStats};
pub use supervisor::TaskSupervisor;
