use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decomposition::Decomposition;
use crate::evaluation::{AgentEvaluation, SystemEvaluation};

/// Priority a user attaches to a submitted [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    Medium,
    /// High priority.
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::str::FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

/// Task status machine (spec §4.1). Advances only through the Supervisor;
/// manual transitions from the external API are permitted but never
/// advance past `Evaluating` automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Inserted, not yet decomposed.
    Pending,
    /// Decomposition LLM call in flight.
    Decomposing,
    /// Engine is driving the agent DAG.
    InProgress,
    /// Engine finished; evaluator is scoring agents and the system.
    Evaluating,
    /// Terminal: no agent errored.
    Completed,
    /// Terminal: at least one agent reported `error` or `blocked_error`.
    CompletedWithErrors,
    /// Terminal: decomposition, scheduling, or evaluation itself threw.
    Error,
}

impl TaskStatus {
    /// Whether this status is terminal (no further automatic transition).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::CompletedWithErrors | TaskStatus::Error
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "decomposing" => Ok(TaskStatus::Decomposing),
            "in_progress" => Ok(TaskStatus::InProgress),
            "evaluating" => Ok(TaskStatus::Evaluating),
            "completed" => Ok(TaskStatus::Completed),
            "completed_with_errors" => Ok(TaskStatus::CompletedWithErrors),
            "error" => Ok(TaskStatus::Error),
            _ => Err(()),
        }
    }
}

/// A user-submitted unit of work (spec §3 "Task"). Mutated only by the
/// Task Lifecycle Supervisor; retained until explicit deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique id.
    pub id: Uuid,
    /// Natural-language description of the work to perform.
    pub description: String,
    /// User-assigned priority.
    pub priority: Priority,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When the task reached a terminal status, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Mean of per-agent overall scores, once evaluated (0–10).
    pub overall_score: Option<f64>,
    /// The decomposition produced for this task, once decomposing succeeds.
    pub decomposition: Option<Decomposition>,
    /// Number of agents spawned for this task.
    pub agent_count: usize,
    /// Final aggregated result, once the run completes.
    pub result: Option<serde_json::Value>,
    /// Per-agent evaluations, populated during `Evaluating`.
    pub evaluations: Vec<AgentEvaluation>,
    /// System-level evaluation, populated once all agents are scored.
    pub system_evaluation: Option<SystemEvaluation>,
    /// Error message if the task's own control flow threw.
    pub error: Option<String>,
}

impl Task {
    /// Constructs a new task in `Pending` status.
    pub fn new(description: impl Into<String>, priority: Priority, due_date: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            priority,
            due_date,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            overall_score: None,
            decomposition: None,
            agent_count: 0,
            result: None,
            evaluations: Vec::new(),
            system_evaluation: None,
            error: None,
        }
    }

    /// Transitions to `status`, updating `updated_at` and, if the new
    /// status is terminal, `completed_at`.
    pub fn transition(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        if status.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
    }
}
