use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chorus_agent::AgentRuntime;
use chorus_core::{AgentConfig, AgentReport, AgentStats, AgentStatus, CancellationToken};
use chorus_mcp::LlmBackend;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{AgentEvent, AgentEventSink};

/// Overall run outcome the Engine hands back to the Supervisor (spec
/// §4.2 "Outputs").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Every agent reported `completed`.
    CompletedSuccessfully,
    /// At least one agent reported `error`, `blocked_error`, or `stalled`.
    CompletedWithErrors,
}

/// The Engine's complete, fatal-free result: a report for every agent it
/// was given, plus the aggregate status (spec §4.2 "Outputs", I8).
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub reports: HashMap<String, AgentReport>,
    pub status: EngineStatus,
}

/// The Workflow Engine (spec §4.2, CORE): drives a set of agents to
/// terminal states honoring dependency order and parallel-group
/// batching, detecting stall and error-cascade conditions. Never panics
/// and never propagates an agent's failure past its own report (spec
/// §4.2 "Failure model", I8).
pub struct WorkflowEngine {
    runtime: Arc<AgentRuntime>,
    backend: Arc<dyn LlmBackend>,
}

impl WorkflowEngine {
    pub fn new(runtime: Arc<AgentRuntime>, backend: Arc<dyn LlmBackend>) -> Self {
        Self { runtime, backend }
    }

    /// Drives `agents` to completion. `task_id` scopes audit/vector-store
    /// writes made by the Agent Runtime; `on_event` (if given) is invoked
    /// synchronously for every status transition, in emission order
    /// within one agent but with no ordering guarantee across agents
    /// (spec §5 "Event order across agents").
    pub async fn run(
        &self,
        task_id: Uuid,
        agents: Vec<AgentConfig>,
        cancellation: CancellationToken,
        on_event: Option<AgentEventSink>,
    ) -> EngineOutcome {
        let by_id: HashMap<String, AgentConfig> = agents.into_iter().map(|a| (a.id.clone(), a)).collect();
        let mut statuses: HashMap<String, AgentStatus> = HashMap::new();
        let mut reports: HashMap<String, AgentReport> = HashMap::new();

        for id in by_id.keys() {
            statuses.insert(id.clone(), AgentStatus::Pending);
            emit(&on_event, task_id, id, AgentStatus::Pending, None);
        }

        loop {
            let completed: HashSet<String> = statuses
                .iter()
                .filter(|(_, s)| s.is_terminal())
                .map(|(id, _)| id.clone())
                .collect();

            if completed.len() == by_id.len() {
                break;
            }

            // Only a successfully-completed dependency satisfies readiness;
            // an errored/blocked/stalled dependency must route its
            // dependents into the cascade branch below instead of letting
            // them dispatch (spec §4.2 "Error cascade").
            let succeeded: HashSet<String> = statuses
                .iter()
                .filter(|(_, s)| **s == AgentStatus::Completed)
                .map(|(id, _)| id.clone())
                .collect();

            if cancellation.is_cancelled() {
                for (id, status) in statuses.iter_mut() {
                    if !status.is_terminal() {
                        *status = AgentStatus::Error;
                        let report = synthesize_report(&by_id[id], AgentStatus::Error, "run cancelled");
                        emit(&on_event, task_id, id, AgentStatus::Error, Some(report.clone()));
                        reports.insert(id.clone(), report);
                    }
                }
                break;
            }

            let ready: Vec<&AgentConfig> = by_id
                .values()
                .filter(|a| statuses.get(&a.id) == Some(&AgentStatus::Pending) && a.is_ready(&succeeded))
                .collect();

            if ready.is_empty() {
                let error_ids: HashSet<&str> = statuses
                    .iter()
                    .filter(|(_, s)| s.is_error_like())
                    .map(|(id, _)| id.as_str())
                    .collect();
                let non_terminal: Vec<&AgentConfig> = by_id
                    .values()
                    .filter(|a| !statuses[&a.id].is_terminal())
                    .collect();

                let cascade = !non_terminal.is_empty()
                    && non_terminal
                        .iter()
                        .all(|a| a.dependencies.iter().any(|d| error_ids.contains(d.as_str())));

                let (next_status, reason) = if cascade {
                    (AgentStatus::BlockedError, "blocked: a dependency reported an error")
                } else {
                    (AgentStatus::Stalled, "stalled: no ready agents remain but work is outstanding")
                };

                warn!(task_id = %task_id, ?next_status, "engine ending run: no ready agents");
                for a in non_terminal {
                    statuses.insert(a.id.clone(), next_status);
                    let report = synthesize_report(a, next_status, reason);
                    emit(&on_event, task_id, &a.id, next_status, Some(report.clone()));
                    reports.insert(a.id.clone(), report);
                }
                break;
            }

            let mut groups: BTreeMap<String, Vec<&AgentConfig>> = BTreeMap::new();
            for a in ready {
                groups.entry(a.parallel_group.clone()).or_default().push(a);
            }

            for (group, members) in groups {
                info!(task_id = %task_id, group = %group, count = members.len(), "dispatching parallel group");
                let mut handles = Vec::with_capacity(members.len());
                for agent in members {
                    statuses.insert(agent.id.clone(), AgentStatus::ReadyToExecute);
                    emit(&on_event, task_id, &agent.id, AgentStatus::ReadyToExecute, None);

                    let dependency_results: HashMap<String, AgentReport> = agent
                        .dependencies
                        .iter()
                        .filter_map(|d| reports.get(d).map(|r| (d.clone(), r.clone())))
                        .collect();

                    statuses.insert(agent.id.clone(), AgentStatus::InProgress);
                    emit(&on_event, task_id, &agent.id, AgentStatus::InProgress, None);

                    let runtime = self.runtime.clone();
                    let backend = self.backend.clone();
                    let config = agent.clone();
                    let cancellation = cancellation.clone();
                    handles.push((
                        config.id.clone(),
                        tokio::spawn(async move {
                            runtime.run(task_id, &config, backend, &dependency_results, &cancellation).await
                        }),
                    ));
                }

                for (agent_id, handle) in handles {
                    let config = &by_id[&agent_id];
                    let report = match handle.await {
                        Ok(report) => report,
                        Err(join_error) => synthesize_report(
                            config,
                            AgentStatus::Error,
                            &format!("agent task panicked: {join_error}"),
                        ),
                    };
                    statuses.insert(agent_id.clone(), report.status);
                    emit(&on_event, task_id, &agent_id, report.status, Some(report.clone()));
                    reports.insert(agent_id, report);
                }
            }
        }

        let status = if reports.values().any(|r| r.status != AgentStatus::Completed) {
            EngineStatus::CompletedWithErrors
        } else {
            EngineStatus::CompletedSuccessfully
        };

        EngineOutcome { reports, status }
    }
}

fn emit(sink: &Option<AgentEventSink>, task_id: Uuid, agent_id: &str, status: AgentStatus, report: Option<AgentReport>) {
    if let Some(sink) = sink {
        sink(AgentEvent::new(task_id, agent_id, status, report));
    }
}

/// Builds a terminal report for an agent the Engine assigns a status to
/// without ever invoking the Agent Runtime (`blocked_error`, `stalled`,
/// or an engine-side exception) — spec §4.2's own failure synthesis, as
/// distinct from the Agent Runtime's (spec §4.3).
fn synthesize_report(config: &AgentConfig, status: AgentStatus, reasoning: &str) -> AgentReport {
    let now = Utc::now();
    AgentReport {
        agent_id: config.id.clone(),
        task_assigned: config.task_assigned.clone(),
        status,
        start_time: now,
        end_time: now,
        execution_time_ms: 0,
        result: None,
        reasoning: reasoning.to_string(),
        tools_used: Vec::new(),
        stats: AgentStats::default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_core::{AgentRole, ChorusResult, Message};
    use chorus_mcp::LlmResponse;
    use chorus_memory::{InMemoryVectorStore, LocalEmbedding};
    use chorus_security::{AuditLog, PermissionSet};
    use chorus_skills::SkillDescriptor;

    fn agent(id: &str, deps: &[&str], group: &str) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            task_assigned: format!("do {id}"),
            agent_type: AgentRole::General,
            system_instruction: AgentRole::General.system_instruction().to_string(),
            tool_whitelist: vec![],
            parallel_group: group.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Scripted per-agent backend keyed by the task text each agent is
    /// assigned, so every agent in a run can return a distinct canned
    /// result without sharing mutable state across concurrent tasks.
    struct KeyedBackend {
        scripts: HashMap<String, Result<String, ()>>,
    }

    #[async_trait]
    impl LlmBackend for KeyedBackend {
        async fn generate(&self, messages: &[Message], _tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse> {
            let system_text = messages.first().map(Message::as_text).unwrap_or_default();
            for (key, outcome) in &self.scripts {
                if system_text.contains(key.as_str()) {
                    return match outcome {
                        Ok(text) => Ok(LlmResponse::Text(text.clone())),
                        Err(()) => Err(chorus_core::ChorusError::Agent(format!("{key} was configured to fail"))),
                    };
                }
            }
            Ok(LlmResponse::Text("default".to_string()))
        }
    }

    fn test_engine(scripts: HashMap<String, Result<String, ()>>) -> WorkflowEngine {
        let runtime = Arc::new(AgentRuntime::new(
            Arc::new(chorus_skills::SkillRegistry::new()),
            PermissionSet::new(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(LocalEmbedding::default()),
            Arc::new(AuditLog::new(100)),
        ));
        let backend: Arc<dyn LlmBackend> = Arc::new(KeyedBackend { scripts });
        WorkflowEngine::new(runtime, backend)
    }

    #[tokio::test]
    async fn linear_dag_runs_in_dependency_order() {
        let mut scripts = HashMap::new();
        scripts.insert("do s1".to_string(), Ok("R1".to_string()));
        scripts.insert("do s2".to_string(), Ok("R2".to_string()));
        scripts.insert("do s3".to_string(), Ok("R3".to_string()));
        let engine = test_engine(scripts);

        let agents = vec![agent("s1", &[], "A"), agent("s2", &["s1"], "B"), agent("s3", &["s2"], "C")];
        let outcome = engine.run(Uuid::new_v4(), agents, CancellationToken::new(), None).await;

        assert_eq!(outcome.status, EngineStatus::CompletedSuccessfully);
        let s1 = &outcome.reports["s1"];
        let s2 = &outcome.reports["s2"];
        let s3 = &outcome.reports["s3"];
        assert!(s2.start_time >= s1.end_time);
        assert!(s3.start_time >= s2.end_time);
        assert_eq!(s1.result, Some(serde_json::json!("R1")));
    }

    #[tokio::test]
    async fn diamond_dag_waits_for_both_middle_tier_branches() {
        let mut scripts = HashMap::new();
        scripts.insert("do s1".to_string(), Ok("R1".to_string()));
        scripts.insert("do s2".to_string(), Ok("R2".to_string()));
        scripts.insert("do s3".to_string(), Ok("R3".to_string()));
        scripts.insert("do s4".to_string(), Ok("R4".to_string()));
        let engine = test_engine(scripts);

        let agents = vec![
            agent("s1", &[], "A"),
            agent("s2", &["s1"], "B"),
            agent("s3", &["s1"], "B"),
            agent("s4", &["s2", "s3"], "C"),
        ];
        let outcome = engine.run(Uuid::new_v4(), agents, CancellationToken::new(), None).await;

        assert_eq!(outcome.status, EngineStatus::CompletedSuccessfully);
        assert_eq!(outcome.reports["s4"].status, AgentStatus::Completed);
        assert!(outcome.reports["s4"].start_time >= outcome.reports["s2"].end_time);
        assert!(outcome.reports["s4"].start_time >= outcome.reports["s3"].end_time);
    }

    #[tokio::test]
    async fn error_cascades_to_dependents() {
        let mut scripts = HashMap::new();
        scripts.insert("do s1".to_string(), Ok("R1".to_string()));
        scripts.insert("do s2".to_string(), Err(()));
        let engine = test_engine(scripts);

        let agents = vec![agent("s1", &[], "A"), agent("s2", &["s1"], "B"), agent("s3", &["s2"], "C")];
        let outcome = engine.run(Uuid::new_v4(), agents, CancellationToken::new(), None).await;

        assert_eq!(outcome.status, EngineStatus::CompletedWithErrors);
        assert_eq!(outcome.reports["s1"].status, AgentStatus::Completed);
        assert_eq!(outcome.reports["s2"].status, AgentStatus::Error);
        assert_eq!(outcome.reports["s3"].status, AgentStatus::BlockedError);
    }

    #[tokio::test]
    async fn mutual_dependency_stalls_instead_of_hanging() {
        let engine = test_engine(HashMap::new());
        let agents = vec![agent("s1", &["s2"], "A"), agent("s2", &["s1"], "A")];
        let outcome = engine.run(Uuid::new_v4(), agents, CancellationToken::new(), None).await;

        assert_eq!(outcome.status, EngineStatus::CompletedWithErrors);
        assert_eq!(outcome.reports["s1"].status, AgentStatus::Stalled);
        assert_eq!(outcome.reports["s2"].status, AgentStatus::Stalled);
    }

    #[tokio::test]
    async fn cancellation_marks_outstanding_agents_as_errored() {
        let engine = test_engine(HashMap::new());
        let token = CancellationToken::new();
        token.cancel();
        let agents = vec![agent("s1", &[], "A")];
        let outcome = engine.run(Uuid::new_v4(), agents, token, None).await;

        assert_eq!(outcome.status, EngineStatus::CompletedWithErrors);
        assert_eq!(outcome.reports["s1"].status, AgentStatus::Error);
    }

    #[tokio::test]
    async fn engine_never_panics_on_empty_agent_list() {
        let engine = test_engine(HashMap::new());
        let outcome = engine.run(Uuid::new_v4(), vec![], CancellationToken::new(), None).await;
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.status, EngineStatus::CompletedSuccessfully);
    }
}
