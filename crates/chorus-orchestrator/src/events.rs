use chorus_core::{AgentReport, AgentStatus, Task};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One agent state change (spec §4.2 "Event stream"): every transition
/// produces exactly one of these, carrying the full report once terminal.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    /// Id of the task this agent belongs to.
    pub task_id: Uuid,
    /// Equals [`chorus_core::AgentConfig::id`].
    pub agent_id: String,
    /// The status just reached.
    pub status: AgentStatus,
    /// When this event was emitted.
    pub timestamp: DateTime<Utc>,
    /// Present iff `status` is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AgentReport>,
}

impl AgentEvent {
    pub fn new(task_id: Uuid, agent_id: impl Into<String>, status: AgentStatus, report: Option<AgentReport>) -> Self {
        Self {
            task_id,
            agent_id: agent_id.into(),
            status,
            timestamp: Utc::now(),
            report,
        }
    }
}

/// Callback the Engine invokes on every agent state change (spec §4.2
/// "update callback `onEvent(agentDelta)`"). A plain `Fn` rather than a
/// channel so the Supervisor can update its own state synchronously
/// before any broadcast goes out — matching the single-writer discipline
/// of spec.md §5 "Shared state".
pub type AgentEventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// A snapshot of one agent's latest known status, as exposed by
/// `GET /tasks/:id/agents` (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AgentReport>,
}

/// Counts backing `GET /system/stats` (spec §6): one entry per fixed
/// vector-store collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub tasks: usize,
    pub agent_executions: usize,
    pub knowledge_base: usize,
    pub agent_memory: usize,
}

/// Everything broadcast on the `/events` SSE stream (spec §6 "Event
/// stream"), pre-rendered so the gateway's SSE handler never has to call
/// back into the Supervisor mid-stream.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The full task list, on connect and on any task change.
    Tasks(Vec<Task>),
    /// `taskId -> agentId -> status`, on any agent change.
    Agents(HashMap<Uuid, HashMap<String, AgentSnapshot>>),
    /// Collection counts, broadcast after a task reaches a terminal status.
    Stats(SystemStats),
}
