use std::collections::HashMap;
use std::sync::Arc;

use chorus_core::{
    AgentConfig, CancellationToken, ChorusError, ChorusResult, Decomposition, Message, Priority, Subtask, Task, TaskStatus,
};
use chorus_mcp::{parse::parse_json_response, LlmBackend, LlmResponse};
use chorus_memory::{VectorStoreGateway, AGENT_EXECUTIONS_COLLECTION, AGENT_MEMORY_COLLECTION, KNOWLEDGE_BASE_COLLECTION, TASKS_COLLECTION};
use chrono::{DateTime, Utc};
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{EngineStatus, WorkflowEngine};
use crate::evaluator::Evaluator;
use crate::events::{AgentEvent, AgentEventSink, AgentSnapshot, GatewayEvent, SystemStats};

/// Sequences decompose → schedule → evaluate for every submitted task,
/// owns the authoritative task registry, and fans status changes out to
/// `/events` subscribers (spec §4.1).
///
/// `tasks` is guarded by an async lock since it is only ever touched
/// from async pipeline methods. `agent_statuses` is guarded by a
/// synchronous lock so the Engine's per-event callback — a plain `Fn`,
/// not a future — can update it and broadcast in one uninterrupted step
/// (spec §5 "Shared state").
pub struct TaskSupervisor {
    tasks: RwLock<HashMap<Uuid, Task>>,
    agent_statuses: SyncRwLock<HashMap<Uuid, HashMap<String, AgentSnapshot>>>,
    cancellations: SyncRwLock<HashMap<Uuid, CancellationToken>>,
    tx: broadcast::Sender<GatewayEvent>,
    engine: WorkflowEngine,
    decomposition_backend: Arc<dyn LlmBackend>,
    evaluator: Evaluator,
    vector_store: Arc<dyn VectorStoreGateway>,
}

impl TaskSupervisor {
    pub fn new(
        engine: WorkflowEngine,
        decomposition_backend: Arc<dyn LlmBackend>,
        evaluator: Evaluator,
        vector_store: Arc<dyn VectorStoreGateway>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tasks: RwLock::new(HashMap::new()),
            agent_statuses: SyncRwLock::new(HashMap::new()),
            cancellations: SyncRwLock::new(HashMap::new()),
            tx,
            engine,
            decomposition_backend,
            evaluator,
            vector_store,
        }
    }

    /// Inserts the task `pending` and returns immediately (so a REST
    /// handler can answer `201` synchronously), then drives the rest of
    /// the pipeline in the background (spec §4.1 "Algorithm (submit)").
    pub async fn submit(self: Arc<Self>, description: String, priority: Priority, due_date: Option<DateTime<Utc>>) -> Task {
        let task = Task::new(description, priority, due_date);
        let task_id = task.id;
        self.tasks.write().await.insert(task_id, task.clone());
        self.agent_statuses.write().insert(task_id, HashMap::new());
        self.broadcast_tasks().await;

        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.run_pipeline(task_id).await;
        });

        task
    }

    async fn run_pipeline(self: Arc<Self>, task_id: Uuid) {
        if let Err(err) = self.clone().run_pipeline_inner(task_id).await {
            self.fail_task(task_id, err).await;
        }
    }

    async fn run_pipeline_inner(self: Arc<Self>, task_id: Uuid) -> ChorusResult<()> {
        self.transition(task_id, TaskStatus::Decomposing).await;

        let description = self
            .tasks
            .read()
            .await
            .get(&task_id)
            .map(|t| t.description.clone())
            .ok_or_else(|| ChorusError::Orchestrator(format!("task {task_id} vanished before decomposition")))?;

        let decomposition = self.decompose(task_id, &description).await?;
        let agents: Vec<AgentConfig> = decomposition.subtasks.iter().map(AgentConfig::from_subtask).collect();
        let agent_count = agents.len();

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                task.agent_count = agent_count;
                task.decomposition = Some(decomposition);
            }
        }

        self.transition(task_id, TaskStatus::InProgress).await;

        let cancellation = CancellationToken::new();
        self.cancellations.write().insert(task_id, cancellation.clone());

        let sink_supervisor = self.clone();
        let on_event: AgentEventSink = Arc::new(move |event| sink_supervisor.handle_agent_event(event));

        let outcome = self.engine.run(task_id, agents, cancellation, Some(on_event)).await;
        self.cancellations.write().remove(&task_id);

        self.transition(task_id, TaskStatus::Evaluating).await;

        let mut evaluations = Vec::with_capacity(outcome.reports.len());
        for report in outcome.reports.values() {
            evaluations.push(self.evaluator.evaluate_agent(report, &description).await);
        }

        let task_snapshot = self
            .tasks
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or_else(|| ChorusError::Orchestrator(format!("task {task_id} vanished before system evaluation")))?;
        let system_evaluation = self.evaluator.evaluate_system(task_id, &task_snapshot, &evaluations).await;

        let overall_score = if evaluations.is_empty() {
            None
        } else {
            Some(evaluations.iter().map(|e| e.overall).sum::<f64>() / evaluations.len() as f64)
        };

        let result = serde_json::to_value(
            outcome
                .reports
                .values()
                .map(|r| (r.agent_id.clone(), r.result.clone()))
                .collect::<HashMap<_, _>>(),
        )
        .unwrap_or(serde_json::Value::Null);

        let final_status = match outcome.status {
            EngineStatus::CompletedSuccessfully => TaskStatus::Completed,
            EngineStatus::CompletedWithErrors => TaskStatus::CompletedWithErrors,
        };

        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                task.result = Some(result);
                task.evaluations = evaluations;
                task.system_evaluation = Some(system_evaluation);
                task.overall_score = overall_score;
                task.transition(final_status);
            }
        }
        self.broadcast_tasks().await;
        self.broadcast_stats().await;

        Ok(())
    }

    async fn decompose(&self, task_id: Uuid, description: &str) -> ChorusResult<Decomposition> {
        let prompt = Message::user(format!(
            "Break the following task into an agent DAG. Respond with a JSON object \
             {{\"subtasks\": [{{\"subtaskId\": \"...\", \"subtaskName\": \"...\", \"dependencies\": [\"...\"], \
             \"parallelGroup\": \"...\", \"estimatedComplexity\": 1-5, \"description\": \"...\"}}]}}.\n\nTask: {description}"
        ));

        let response = self.decomposition_backend.generate(&[prompt], &[]).await?;
        let value = match response {
            LlmResponse::Structured(value) => value,
            LlmResponse::Text(text) => parse_json_response(&text)
                .ok_or_else(|| ChorusError::Decomposition("decomposition response was not valid JSON".to_string()))?,
            LlmResponse::Tool(_) => {
                return Err(ChorusError::Decomposition("decomposition backend returned a tool call, expected JSON".to_string()))
            }
        };

        let subtasks_value = match &value {
            serde_json::Value::Array(_) => value.clone(),
            serde_json::Value::Object(map) if map.contains_key("subtasks") => map["subtasks"].clone(),
            other => return Err(ChorusError::Decomposition(format!("unexpected decomposition shape: {other}"))),
        };

        let subtasks: Vec<Subtask> =
            serde_json::from_value(subtasks_value).map_err(|e| ChorusError::Decomposition(format!("malformed subtasks: {e}")))?;

        let decomposition = Decomposition { main_task_id: task_id, subtasks };
        decomposition.validate()?;
        Ok(decomposition)
    }

    async fn fail_task(&self, task_id: Uuid, err: ChorusError) {
        warn!(task_id = %task_id, error = %err, "task pipeline failed");
        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                task.error = Some(err.to_string());
                task.transition(TaskStatus::Error);
            }
        }
        self.broadcast_tasks().await;
    }

    async fn transition(&self, task_id: Uuid, status: TaskStatus) {
        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                task.transition(status);
            }
        }
        self.broadcast_tasks().await;
    }

    /// Invoked synchronously by the Engine on every agent state change.
    /// Updates the agent-status map and broadcasts before the Engine's
    /// call stack unwinds — the single-writer discipline spec §5 asks for.
    fn handle_agent_event(&self, event: AgentEvent) {
        let snapshot = {
            let mut statuses = self.agent_statuses.write();
            let task_map = statuses.entry(event.task_id).or_default();
            task_map.insert(event.agent_id.clone(), AgentSnapshot { status: event.status, report: event.report.clone() });
            statuses.clone()
        };
        let _ = self.tx.send(GatewayEvent::Agents(snapshot));
    }

    async fn broadcast_tasks(&self) {
        let tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        let _ = self.tx.send(GatewayEvent::Tasks(tasks));
    }

    async fn broadcast_stats(&self) {
        let stats = self.stats().await;
        let _ = self.tx.send(GatewayEvent::Stats(stats));
    }

    pub async fn get(&self, task_id: Uuid) -> Option<Task> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    pub async fn delete(&self, task_id: Uuid) -> bool {
        if let Some(token) = self.cancellations.write().remove(&task_id) {
            token.cancel();
        }
        self.agent_statuses.write().remove(&task_id);
        let removed = self.tasks.write().await.remove(&task_id).is_some();
        if removed {
            self.broadcast_tasks().await;
        }
        removed
    }

    /// Manual transition from the external API. Never advances past
    /// `evaluating` on its own — that only happens from inside the
    /// pipeline (spec §4.1 "Task status machine").
    pub async fn update_status(&self, task_id: Uuid, status: TaskStatus) -> ChorusResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ChorusError::Orchestrator(format!("no such task {task_id}")))?;
        task.transition(status);
        drop(tasks);
        self.broadcast_tasks().await;
        Ok(())
    }

    pub async fn update_priority(&self, task_id: Uuid, priority: Priority) -> ChorusResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ChorusError::Orchestrator(format!("no such task {task_id}")))?;
        task.priority = priority;
        task.updated_at = Utc::now();
        drop(tasks);
        self.broadcast_tasks().await;
        Ok(())
    }

    pub fn get_agents(&self, task_id: Uuid) -> HashMap<String, AgentSnapshot> {
        self.agent_statuses.read().get(&task_id).cloned().unwrap_or_default()
    }

    pub async fn stats(&self) -> SystemStats {
        SystemStats {
            tasks: self.vector_store.count(TASKS_COLLECTION).await.unwrap_or(0),
            agent_executions: self.vector_store.count(AGENT_EXECUTIONS_COLLECTION).await.unwrap_or(0),
            knowledge_base: self.vector_store.count(KNOWLEDGE_BASE_COLLECTION).await.unwrap_or(0),
            agent_memory: self.vector_store.count(AGENT_MEMORY_COLLECTION).await.unwrap_or(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        info!("new /events subscriber");
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_agent::AgentRuntime;
    use chorus_memory::{InMemoryVectorStore, LocalEmbedding};
    use chorus_security::{AuditLog, PermissionSet};
    use chorus_skills::{SkillDescriptor, SkillRegistry};
    use tokio::time::{timeout, Duration};

    struct ScriptedBackend;

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, messages: &[Message], _tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse> {
            let text = messages.first().map(Message::as_text).unwrap_or_default();
            if text.contains("Break the following task") {
                return Ok(LlmResponse::Text(
                    r#"{"subtasks":[{"subtaskId":"s1","subtaskName":"research","dependencies":[],"parallelGroup":"A"}]}"#.to_string(),
                ));
            }
            if text.contains("accuracy") {
                return Ok(LlmResponse::Text(
                    r#"{"accuracy":{"rating":8,"reason":"ok"},"completeness":{"rating":8,"reason":"ok"},"coherence":{"rating":8,"reason":"ok"}}"#.to_string(),
                ));
            }
            if text.contains("systemRating") {
                return Ok(LlmResponse::Text(r#"{"systemRating":8,"analysis":"good","recommendations":"none"}"#.to_string()));
            }
            Ok(LlmResponse::Text("final result".to_string()))
        }
    }

    fn test_supervisor() -> Arc<TaskSupervisor> {
        let store: Arc<dyn VectorStoreGateway> = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(LocalEmbedding::default());
        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend);
        let runtime = Arc::new(AgentRuntime::new(
            Arc::new(SkillRegistry::new()),
            PermissionSet::new(),
            store.clone(),
            embedder.clone(),
            Arc::new(AuditLog::new(100)),
        ));
        let engine = WorkflowEngine::new(runtime, backend.clone());
        let evaluator = Evaluator::new(backend.clone(), store.clone(), embedder);
        Arc::new(TaskSupervisor::new(engine, backend, evaluator, store))
    }

    #[tokio::test]
    async fn submit_runs_pipeline_to_completion() {
        let supervisor = test_supervisor();
        let mut events = supervisor.subscribe();
        let task = supervisor.clone().submit("research the topic".to_string(), Priority::Medium, None).await;
        assert_eq!(task.status, TaskStatus::Pending);

        let finished = timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(GatewayEvent::Tasks(tasks)) = events.recv().await {
                    if let Some(t) = tasks.iter().find(|t| t.id == task.id) {
                        if t.status.is_terminal() {
                            return t.clone();
                        }
                    }
                }
            }
        })
        .await
        .expect("pipeline did not finish in time");

        assert_eq!(finished.status, TaskStatus::Completed);
        assert_eq!(finished.agent_count, 1);
        assert!(finished.overall_score.is_some());
    }

    #[tokio::test]
    async fn delete_removes_task_and_cancels_pending_pipeline() {
        let supervisor = test_supervisor();
        let task = supervisor.clone().submit("research the topic".to_string(), Priority::Low, None).await;
        let removed = supervisor.delete(task.id).await;
        assert!(removed);
        assert!(supervisor.get(task.id).await.is_none());
    }
}
