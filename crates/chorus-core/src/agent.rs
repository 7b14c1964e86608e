use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed agent types resolved by keyword match against a subtask's
/// description (spec §4.1 "Agent Registry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Matches "research", "find", "gather".
    Researcher,
    /// Matches "plan", "schedule", "organize", "break down".
    Planner,
    /// Matches "evaluate", "assess", "review".
    Evaluator,
    /// Matches "execute", "perform", "implement".
    Executor,
    /// Fallback when no keyword matches.
    General,
}

impl AgentRole {
    /// Resolves a role from a subtask description by keyword match. The
    /// first matching keyword wins; order mirrors spec §4.1's listing.
    pub fn from_description(description: &str) -> Self {
        let d = description.to_ascii_lowercase();
        const RESEARCH: &[&str] = &["research", "find", "gather"];
        const PLAN: &[&str] = &["plan", "schedule", "organize", "break down"];
        const EVAL: &[&str] = &["evaluate", "assess", "review"];
        const EXEC: &[&str] = &["execute", "perform", "implement"];

        if RESEARCH.iter().any(|k| d.contains(k)) {
            AgentRole::Researcher
        } else if PLAN.iter().any(|k| d.contains(k)) {
            AgentRole::Planner
        } else if EVAL.iter().any(|k| d.contains(k)) {
            AgentRole::Evaluator
        } else if EXEC.iter().any(|k| d.contains(k)) {
            AgentRole::Executor
        } else {
            AgentRole::General
        }
    }

    /// The fixed system instruction for this role.
    pub fn system_instruction(&self) -> &'static str {
        match self {
            AgentRole::Researcher => {
                "You are a research agent. Gather and summarize relevant information for the assigned subtask."
            }
            AgentRole::Planner => {
                "You are a planning agent. Break the assigned subtask down into a clear, ordered approach."
            }
            AgentRole::Evaluator => {
                "You are an evaluation agent. Assess the assigned subject against the given criteria."
            }
            AgentRole::Executor => {
                "You are an execution agent. Carry out the assigned subtask and report the concrete result."
            }
            AgentRole::General => {
                "You are a general-purpose agent. Complete the assigned subtask as best you can."
            }
        }
    }

    /// The fixed tool whitelist (skill names) for this role.
    pub fn tool_whitelist(&self) -> &'static [&'static str] {
        match self {
            AgentRole::Researcher => &["http_fetch", "file_read"],
            AgentRole::Planner => &["file_read"],
            AgentRole::Evaluator => &["file_read"],
            AgentRole::Executor => &["file_read", "file_write", "shell"],
            AgentRole::General => &["file_read", "http_fetch"],
        }
    }
}

/// Agent runtime state machine (spec §4.3), plus the engine-level terminal
/// states `BlockedError`/`Stalled` that the Engine assigns without ever
/// invoking the Agent Runtime (spec §4.2). `Waiting` and `ReadyToExecute`
/// are UI affordances only (spec §9 Open Questions): never read by
/// scheduling logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not yet ready: dependencies unmet.
    Pending,
    /// Informational: known to have unmet dependencies.
    Waiting,
    /// Dependencies satisfied; about to be dispatched.
    ReadyToExecute,
    /// Agent Runtime is actively driving the MCP↔tool loop.
    InProgress,
    /// Terminal: ran to completion.
    Completed,
    /// Terminal: the Agent Runtime raised an error.
    Error,
    /// Terminal: assigned by the Engine because a dependency errored.
    BlockedError,
    /// Terminal: assigned by the Engine because no ready agents remain
    /// while non-terminal agents are still outstanding (stall).
    Stalled,
}

impl AgentStatus {
    /// Whether this status is terminal (counts toward the Engine's
    /// `completed` set).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed
                | AgentStatus::Error
                | AgentStatus::BlockedError
                | AgentStatus::Stalled
        )
    }

    /// Whether this status represents a failure for cascade-detection
    /// purposes (spec §4.2 "Error cascade").
    pub fn is_error_like(&self) -> bool {
        matches!(self, AgentStatus::Error | AgentStatus::BlockedError)
    }
}

/// Execution statistics recorded on an [`AgentReport`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    /// Wall-clock duration of the run, in milliseconds.
    pub execution_time_ms: i64,
    /// Count of tool calls the agent made across all loop iterations.
    pub tool_calls_made: u32,
}

/// Configuration for one agent, built by the Supervisor from a
/// [`crate::decomposition::Subtask`] (spec §3 "Agent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Equals the originating subtask id.
    pub id: String,
    /// Natural-language description of the assigned work.
    pub task_assigned: String,
    /// Resolved agent type.
    pub agent_type: AgentRole,
    /// Fixed system instruction for `agent_type`.
    pub system_instruction: String,
    /// Fixed tool whitelist for `agent_type`.
    pub tool_whitelist: Vec<String>,
    /// Parallel-group label from the decomposition.
    pub parallel_group: String,
    /// Ids of subtasks that must complete before this one is ready.
    pub dependencies: Vec<String>,
}

impl AgentConfig {
    /// Builds an agent config from a subtask, resolving its type via
    /// keyword match against the description.
    pub fn from_subtask(subtask: &crate::decomposition::Subtask) -> Self {
        let description = subtask
            .description
            .clone()
            .unwrap_or_else(|| subtask.subtask_name.clone());
        let agent_type = AgentRole::from_description(&description);
        Self {
            id: subtask.subtask_id.clone(),
            task_assigned: description,
            system_instruction: agent_type.system_instruction().to_string(),
            tool_whitelist: agent_type.tool_whitelist().iter().map(|s| s.to_string()).collect(),
            agent_type,
            parallel_group: subtask.parallel_group.clone(),
            dependencies: subtask.dependencies.clone(),
        }
    }

    /// Whether this agent is ready given the set of already-completed ids.
    pub fn is_ready(&self, completed: &std::collections::HashSet<String>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// Immutable record emitted when an agent reaches a terminal state
/// (spec §3 "Agent Report").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    /// Equals the originating subtask id / [`AgentConfig::id`].
    pub agent_id: String,
    /// Copy of [`AgentConfig::task_assigned`].
    pub task_assigned: String,
    /// Terminal status this report represents.
    pub status: AgentStatus,
    /// When the agent began execution.
    pub start_time: DateTime<Utc>,
    /// When the agent reached a terminal state.
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time`, in milliseconds.
    pub execution_time_ms: i64,
    /// The agent's final result, set iff `status ∈ {completed, error}`.
    pub result: Option<serde_json::Value>,
    /// The agent's reasoning/explanation text.
    pub reasoning: String,
    /// Names of tools invoked during the run, in call order.
    pub tools_used: Vec<String>,
    /// Execution statistics.
    pub stats: AgentStats,
}
