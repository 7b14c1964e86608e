use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// One recorded action: a tool invocation, a permission denial, or a
/// skill-side error.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// When the action was recorded.
    pub timestamp: DateTime<Utc>,
    /// Id of the task the acting agent belongs to.
    pub task_id: Uuid,
    /// Id of the agent (subtask id) performing the action.
    pub agent_id: String,
    /// The action name, e.g. a skill/tool name.
    pub action: String,
    /// Arbitrary structured detail.
    pub details: serde_json::Value,
    /// The outcome of the action.
    pub outcome: AuditOutcome,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// The action completed successfully.
    Success,
    /// The action was denied by a permission check.
    Denied,
    /// The action raised an error.
    Error,
}

/// In-memory, bounded audit trail of tool invocations and permission
/// decisions. Every entry is also emitted as a `tracing` event; the ring
/// itself backs the `/system/stats` endpoint's action counts rather than
/// any durable log file — orchestrator state is explicitly not persisted
/// across restarts.
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    /// Creates an audit log retaining at most `capacity` recent entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Records an entry, emitting it as a structured `tracing` event too.
    pub async fn log(&self, entry: AuditEntry) {
        info!(
            task_id = %entry.task_id,
            agent_id = %entry.agent_id,
            action = %entry.action,
            outcome = ?entry.outcome,
            "audit"
        );
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Convenience constructor + record in one call.
    pub async fn log_action(
        &self,
        task_id: Uuid,
        agent_id: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) {
        self.log(AuditEntry {
            timestamp: Utc::now(),
            task_id,
            agent_id: agent_id.into(),
            action: action.into(),
            details,
            outcome,
        })
        .await;
    }

    /// Total number of entries currently retained.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the log currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
