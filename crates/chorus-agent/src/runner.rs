use std::collections::HashMap;
use std::sync::Arc;

use chorus_core::{
    AgentConfig, AgentReport, AgentStats, AgentStatus, CancellationToken, ChorusError, ChorusResult,
    Message, ToolResult,
};
use chorus_mcp::{describe_backend_error, parse_json_response, LlmBackend, LlmResponse, Mcp, McpConfig};
use chorus_memory::{
    AgentMemory, EmbeddingProvider, EpisodicRecord, VectorStoreGateway, AGENT_EXECUTIONS_COLLECTION,
    TASKS_COLLECTION,
};
use chorus_security::{AuditLog, AuditOutcome, PermissionSet};
use chorus_skills::{SkillDescriptor, SkillRegistry};
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

/// Bound on tool-call loop iterations per agent run (spec §4.3): after
/// this many rounds of tool execution, the agent is forced to a final
/// non-tool answer regardless of what it last requested.
pub const MAX_TOOL_LOOPS: u32 = 5;

/// Prior tasks / long-term memories recalled when priming a run.
const RECALL_K: usize = 3;

/// Drives one agent's MCP↔tool loop to completion (spec §4.3 "Agent
/// Runtime"). Holds the collaborators shared across every agent run
/// (skill registry, permissions, vector store, audit log) — per-run
/// state (the MCP buffer, tool-call counters) lives on the stack of
/// [`Self::run`] instead.
pub struct AgentRuntime {
    skills: Arc<SkillRegistry>,
    permissions: PermissionSet,
    vector_store: Arc<dyn VectorStoreGateway>,
    embedder: Arc<dyn EmbeddingProvider>,
    memory: AgentMemory,
    audit: Arc<AuditLog>,
    mcp_config: McpConfig,
}

impl AgentRuntime {
    pub fn new(
        skills: Arc<SkillRegistry>,
        permissions: PermissionSet,
        vector_store: Arc<dyn VectorStoreGateway>,
        embedder: Arc<dyn EmbeddingProvider>,
        audit: Arc<AuditLog>,
    ) -> Self {
        let memory = AgentMemory::new(vector_store.clone(), embedder.clone());
        Self {
            skills,
            permissions,
            vector_store,
            embedder,
            memory,
            audit,
            mcp_config: McpConfig::default(),
        }
    }

    /// Overrides the default MCP context bounds (spec §4.4).
    #[must_use]
    pub fn with_mcp_config(mut self, mcp_config: McpConfig) -> Self {
        self.mcp_config = mcp_config;
        self
    }

    /// Runs one agent to a terminal state. Never panics and always
    /// returns a well-formed report: failures inside the loop are
    /// captured as an `error` status rather than propagated, matching
    /// the "fatal-free" contract the Engine relies on (spec §4.3
    /// "Error handling").
    ///
    /// The caller (the Engine) is responsible for transitioning the
    /// agent to `in-progress` before invoking this and recording the
    /// returned report's terminal status afterward.
    pub async fn run(
        &self,
        task_id: Uuid,
        config: &AgentConfig,
        backend: Arc<dyn LlmBackend>,
        dependency_results: &HashMap<String, AgentReport>,
        cancellation: &CancellationToken,
    ) -> AgentReport {
        let start_time = Utc::now();
        self.audit
            .log_action(
                task_id,
                config.id.clone(),
                "agent_started",
                serde_json::json!({"agent_type": format!("{:?}", config.agent_type)}),
                AuditOutcome::Success,
            )
            .await;

        let mut tools_used = Vec::new();
        let mut tool_calls_made = 0u32;
        let outcome = self
            .run_inner(
                task_id,
                config,
                backend,
                dependency_results,
                cancellation,
                &mut tools_used,
                &mut tool_calls_made,
            )
            .await;

        let end_time = Utc::now();
        let execution_time_ms = (end_time - start_time).num_milliseconds().max(0);
        let stats = AgentStats { execution_time_ms, tool_calls_made };

        let report = match outcome {
            Ok((result, reasoning)) => {
                info!(agent_id = %config.id, %execution_time_ms, "agent run completed");
                AgentReport {
                    agent_id: config.id.clone(),
                    task_assigned: config.task_assigned.clone(),
                    status: AgentStatus::Completed,
                    start_time,
                    end_time,
                    execution_time_ms,
                    result: Some(result),
                    reasoning,
                    tools_used,
                    stats,
                }
            }
            Err(e) => {
                warn!(agent_id = %config.id, error = %e, "agent run failed");
                AgentReport {
                    agent_id: config.id.clone(),
                    task_assigned: config.task_assigned.clone(),
                    status: AgentStatus::Error,
                    start_time,
                    end_time,
                    execution_time_ms,
                    result: Some(serde_json::json!({ "error": e.to_string() })),
                    reasoning: format!("Agent run failed: {e}"),
                    tools_used,
                    stats,
                }
            }
        };

        self.persist(task_id, &report).await;
        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_inner(
        &self,
        task_id: Uuid,
        config: &AgentConfig,
        backend: Arc<dyn LlmBackend>,
        dependency_results: &HashMap<String, AgentReport>,
        cancellation: &CancellationToken,
        tools_used: &mut Vec<String>,
        tool_calls_made: &mut u32,
    ) -> ChorusResult<(serde_json::Value, String)> {
        let system_text = format!(
            "{}\n\nAssigned subtask: {}",
            config.system_instruction, config.task_assigned
        );
        let mut mcp = Mcp::new(backend, system_text, self.mcp_config);

        if !config.dependencies.is_empty() {
            mcp.add_to_context(Message::user(dependency_summary(config, dependency_results)));
        }
        self.prime_recall(config, &mut mcp).await;

        mcp.add_to_context(Message::user(
            "Execute the assigned subtask. Reason about the approach, then output a final result. \
             Call tools if needed.",
        ));

        let tool_descriptors: Vec<SkillDescriptor> = self
            .skills
            .filter_by_names(&config.tool_whitelist)
            .into_iter()
            .cloned()
            .collect();

        let mut loop_count = 0u32;
        let final_response = loop {
            if cancellation.is_cancelled() {
                return Err(ChorusError::Agent(format!(
                    "agent {} cancelled before completion",
                    config.id
                )));
            }

            let in_bound = loop_count < MAX_TOOL_LOOPS;
            let tools_in_scope: &[SkillDescriptor] = if in_bound { &tool_descriptors } else { &[] };

            let response = match mcp.generate_response(tools_in_scope).await {
                Ok(r) => r,
                Err(e) => {
                    mcp.add_to_context(Message::user(describe_backend_error(&e)));
                    return Err(e);
                }
            };

            match response {
                LlmResponse::Tool(calls) if in_bound => {
                    loop_count += 1;
                    let results = self
                        .execute_tools(task_id, config, &calls, cancellation)
                        .await;
                    for call in &calls {
                        tools_used.push(call.name.clone());
                        *tool_calls_made += 1;
                    }
                    mcp.record_tool_results(&calls, &results);
                    mcp.add_to_context(Message::user(
                        "Tools executed. Produce your final answer, or call more tools if needed.",
                    ));
                }
                LlmResponse::Tool(_) => {
                    // Bound already exceeded; the call above ran with an
                    // empty tool list so this arm should be unreachable in
                    // practice, but a provider could still hallucinate a
                    // tool-call shape. Treat it as the final (opaque) answer.
                    break response;
                }
                other => break other,
            }
        };

        Ok(classify_final_response(&final_response))
    }

    async fn prime_recall(&self, config: &AgentConfig, mcp: &mut Mcp) {
        match self.embedder.embed(&config.task_assigned).await {
            Ok(embedding) => match self.vector_store.query(TASKS_COLLECTION, &embedding, RECALL_K, None).await {
                Ok(hits) => {
                    let text: Vec<String> = hits.into_iter().filter_map(|h| h.record.document).collect();
                    if !text.is_empty() {
                        mcp.add_to_context(Message::user(format!(
                            "Relevant prior tasks:\n{}",
                            text.join("\n")
                        )));
                    }
                }
                Err(e) => warn!(agent_id = %config.id, error = %e, "prior-task recall failed"),
            },
            Err(e) => warn!(agent_id = %config.id, error = %e, "embedding prior-task query failed"),
        }

        match self.memory.recall_similar(&config.id, &config.task_assigned, RECALL_K).await {
            Ok(memories) if !memories.is_empty() => {
                let text: Vec<String> = memories
                    .iter()
                    .map(|m| {
                        let detail = m
                            .reasoning
                            .clone()
                            .or_else(|| m.error.clone())
                            .unwrap_or_default();
                        format!("- {}: {}", m.task, detail)
                    })
                    .collect();
                mcp.add_to_context(Message::user(format!("Long-term memory:\n{}", text.join("\n"))));
            }
            Ok(_) => {}
            Err(e) => warn!(agent_id = %config.id, error = %e, "long-term memory recall failed"),
        }
    }

    /// Executes every requested tool call concurrently (spec §5
    /// "within an agent, tool calls within one loop iteration execute
    /// concurrently"). A skill raising an error does not abort the
    /// agent: it is represented as a [`ToolResult::Err`] and fed back
    /// to the model like any other result.
    async fn execute_tools(
        &self,
        task_id: Uuid,
        config: &AgentConfig,
        calls: &[chorus_core::ToolCall],
        cancellation: &CancellationToken,
    ) -> Vec<ToolResult> {
        let _ = cancellation;
        let futures = calls.iter().map(|call| {
            let skills = self.skills.clone();
            let permissions = self.permissions.clone();
            let call = call.clone();
            async move {
                match skills.execute(call.clone(), &permissions).await {
                    Ok(result) => result,
                    Err(e) => ToolResult::err(call.id.clone(), e.to_string()),
                }
            }
        });

        let results = join_all(futures).await;

        for (call, result) in calls.iter().zip(results.iter()) {
            let outcome = if result.is_error() { AuditOutcome::Error } else { AuditOutcome::Success };
            self.audit
                .log_action(
                    task_id,
                    config.id.clone(),
                    "tool_call",
                    serde_json::json!({
                        "tool": call.name,
                        "call_id": call.id,
                        "is_error": result.is_error(),
                    }),
                    outcome,
                )
                .await;
        }

        results
    }

    async fn persist(&self, task_id: Uuid, report: &AgentReport) {
        let embed_text = format!("{} {}", report.task_assigned, report.reasoning);
        match self.embedder.embed(&embed_text).await {
            Ok(embedding) => {
                let mut metadata = HashMap::new();
                metadata.insert("task_id".to_string(), serde_json::json!(task_id.to_string()));
                metadata.insert("agent_id".to_string(), serde_json::json!(report.agent_id));
                metadata.insert("status".to_string(), serde_json::json!(format!("{:?}", report.status)));

                if let Err(e) = self.vector_store.get_or_create_collection(AGENT_EXECUTIONS_COLLECTION).await {
                    warn!(error = %e, "failed to create agent_executions collection");
                }
                let document = serde_json::to_string(report).ok();
                if let Err(e) = self
                    .vector_store
                    .add(
                        AGENT_EXECUTIONS_COLLECTION,
                        vec![format!("{task_id}-{}", report.agent_id)],
                        vec![embedding],
                        vec![metadata],
                        vec![document],
                    )
                    .await
                {
                    warn!(error = %e, "failed to persist agent execution report");
                }
            }
            Err(e) => warn!(error = %e, "failed to embed agent execution report"),
        }

        let episodic = if report.status == AgentStatus::Completed {
            EpisodicRecord::success(
                report.task_assigned.clone(),
                report.result.clone().unwrap_or(serde_json::Value::Null),
                report.reasoning.clone(),
            )
        } else {
            let error = report
                .result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| report.reasoning.clone());
            EpisodicRecord::failure(report.task_assigned.clone(), error)
        };
        if let Err(e) = self.memory.remember(&report.agent_id, episodic).await {
            warn!(error = %e, "failed to persist agent memory");
        }
    }
}

/// Summarizes a predecessor's terminal report for the dependency-context
/// message pushed before an agent's own work begins (spec §4.3 step 2).
fn dependency_summary(config: &AgentConfig, dependency_results: &HashMap<String, AgentReport>) -> String {
    let mut lines = vec!["Dependency results:".to_string()];
    for dep_id in &config.dependencies {
        match dependency_results.get(dep_id) {
            Some(report) => {
                let result_text = report
                    .result
                    .as_ref()
                    .map(std::string::ToString::to_string)
                    .unwrap_or_else(|| "(no result)".to_string());
                lines.push(format!(
                    "- {dep_id} ({:?}): {result_text}",
                    report.status
                ));
            }
            None => lines.push(format!("- {dep_id}: (no report available)")),
        }
    }
    lines.join("\n")
}

/// Classifies a final LLM turn into `(result, reasoning)` (spec §4.3 step
/// 5): an object with a `result` field is used as-is (its `reasoning`
/// field, if present and a string, is honored); a bare string is used as
/// the result verbatim with a default reasoning; anything else is kept
/// opaque with a reasoning note.
fn classify_final_response(response: &LlmResponse) -> (serde_json::Value, String) {
    match response {
        LlmResponse::Structured(value) => classify_value(value.clone()),
        LlmResponse::Text(text) => match parse_json_response(text) {
            Some(value) => classify_value(value),
            None => (serde_json::Value::String(text.clone()), "Completed.".to_string()),
        },
        LlmResponse::Tool(calls) => (
            serde_json::json!({ "unexecuted_tool_calls": calls }),
            "Non-standard response shape: tool calls persisted past the loop bound.".to_string(),
        ),
    }
}

fn classify_value(value: serde_json::Value) -> (serde_json::Value, String) {
    if let serde_json::Value::Object(ref map) = value {
        if let Some(result) = map.get("result") {
            let reasoning = map
                .get("reasoning")
                .and_then(|r| r.as_str())
                .map(std::string::ToString::to_string)
                .unwrap_or_else(|| "Completed.".to_string());
            return (result.clone(), reasoning);
        }
    }
    (value, "Non-standard response shape; reasoning not provided.".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_core::{AgentRole, ToolCall};
    use chorus_memory::{InMemoryVectorStore, LocalEmbedding};
    use chorus_skills::Skill;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    fn test_config(id: &str, deps: &[&str]) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            task_assigned: "summarize the quarterly report".to_string(),
            agent_type: AgentRole::General,
            system_instruction: AgentRole::General.system_instruction().to_string(),
            tool_whitelist: vec!["echo".to_string()],
            parallel_group: "A".to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn test_runtime() -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(SkillRegistry::new()),
            PermissionSet::new(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(LocalEmbedding::default()),
            Arc::new(AuditLog::new(100)),
        )
    }

    struct ScriptedBackend {
        turns: AsyncMutex<Vec<LlmResponse>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<LlmResponse>) -> Self {
            Self { turns: AsyncMutex::new(turns), calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, _messages: &[Message], _tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut turns = self.turns.lock().await;
            if turns.is_empty() {
                Ok(LlmResponse::Text("done".to_string()))
            } else {
                Ok(turns.remove(0))
            }
        }
    }

    struct EchoSkill;

    #[async_trait]
    impl Skill for EchoSkill {
        fn descriptor(&self) -> &SkillDescriptor {
            use std::sync::OnceLock;
            static DESC: OnceLock<SkillDescriptor> = OnceLock::new();
            DESC.get_or_init(|| SkillDescriptor {
                name: "echo".to_string(),
                description: "echoes its input".to_string(),
                parameters_schema: serde_json::json!({}),
                required_capabilities: vec![],
            })
        }

        async fn execute(&self, call: ToolCall) -> ChorusResult<ToolResult> {
            Ok(ToolResult::success(&call.id, call.arguments.clone()))
        }
    }

    #[tokio::test]
    async fn plain_text_response_completes_with_default_reasoning() {
        let runtime = test_runtime();
        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(vec![LlmResponse::Text("all done".into())]));
        let cfg = test_config("s1", &[]);
        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &HashMap::new(), &CancellationToken::new()).await;

        assert_eq!(report.status, AgentStatus::Completed);
        assert_eq!(report.result, Some(serde_json::json!("all done")));
        assert_eq!(report.reasoning, "Completed.");
    }

    #[tokio::test]
    async fn structured_result_field_is_used_as_is() {
        let runtime = test_runtime();
        let text = r#"```json
{"result": {"answer": 42}, "reasoning": "computed it"}
```"#;
        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(vec![LlmResponse::Text(text.into())]));
        let cfg = test_config("s1", &[]);
        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &HashMap::new(), &CancellationToken::new()).await;

        assert_eq!(report.status, AgentStatus::Completed);
        assert_eq!(report.result, Some(serde_json::json!({"answer": 42})));
        assert_eq!(report.reasoning, "computed it");
    }

    #[tokio::test]
    async fn tool_calls_execute_and_feed_back_before_final_answer() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill));
        let runtime = AgentRuntime::new(
            Arc::new(registry),
            PermissionSet::new(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(LocalEmbedding::default()),
            Arc::new(AuditLog::new(100)),
        );

        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(vec![
            LlmResponse::Tool(vec![ToolCall::new("echo", serde_json::json!({"x": 1}))]),
            LlmResponse::Text("finished using the tool".into()),
        ]));
        let cfg = test_config("s1", &[]);
        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &HashMap::new(), &CancellationToken::new()).await;

        assert_eq!(report.status, AgentStatus::Completed);
        assert_eq!(report.tools_used, vec!["echo".to_string()]);
        assert_eq!(report.stats.tool_calls_made, 1);
    }

    #[tokio::test]
    async fn exceeding_tool_loop_bound_forces_a_final_answer() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill));
        let runtime = AgentRuntime::new(
            Arc::new(registry),
            PermissionSet::new(),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(LocalEmbedding::default()),
            Arc::new(AuditLog::new(100)),
        );

        let mut turns = Vec::new();
        for _ in 0..MAX_TOOL_LOOPS {
            turns.push(LlmResponse::Tool(vec![ToolCall::new("echo", serde_json::json!({}))]));
        }
        turns.push(LlmResponse::Text("out of tries, here is my best guess".into()));

        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(turns));
        let cfg = test_config("s1", &[]);
        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &HashMap::new(), &CancellationToken::new()).await;

        assert_eq!(report.status, AgentStatus::Completed);
        assert_eq!(report.stats.tool_calls_made, MAX_TOOL_LOOPS);
        assert_eq!(report.result, Some(serde_json::json!("out of tries, here is my best guess")));
    }

    #[tokio::test]
    async fn already_cancelled_token_yields_error_report() {
        let runtime = test_runtime();
        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(vec![LlmResponse::Text("never reached".into())]));
        let cfg = test_config("s1", &[]);
        let token = CancellationToken::new();
        token.cancel();
        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &HashMap::new(), &token).await;

        assert_eq!(report.status, AgentStatus::Error);
        assert!(report.reasoning.contains("cancelled"));
    }

    #[tokio::test]
    async fn dependency_results_are_summarized_into_context() {
        let runtime = test_runtime();
        let backend: Arc<dyn LlmBackend> = Arc::new(ScriptedBackend::new(vec![LlmResponse::Text("ack".into())]));
        let cfg = test_config("s2", &["s1"]);

        let mut deps = HashMap::new();
        deps.insert(
            "s1".to_string(),
            AgentReport {
                agent_id: "s1".to_string(),
                task_assigned: "gather data".to_string(),
                status: AgentStatus::Completed,
                start_time: Utc::now(),
                end_time: Utc::now(),
                execution_time_ms: 10,
                result: Some(serde_json::json!("the data")),
                reasoning: "Completed.".to_string(),
                tools_used: vec![],
                stats: AgentStats::default(),
            },
        );

        let report = runtime.run(Uuid::new_v4(), &cfg, backend, &deps, &CancellationToken::new()).await;
        assert_eq!(report.status, AgentStatus::Completed);
    }

    #[test]
    fn classify_bare_string_defaults_reasoning() {
        let (result, reasoning) = classify_final_response(&LlmResponse::Text("plain answer".into()));
        assert_eq!(result, serde_json::json!("plain answer"));
        assert_eq!(reasoning, "Completed.");
    }

    #[test]
    fn classify_opaque_object_notes_non_standard_shape() {
        let (result, reasoning) = classify_value(serde_json::json!({"foo": "bar"}));
        assert_eq!(result, serde_json::json!({"foo": "bar"}));
        assert!(reasoning.contains("Non-standard"));
    }
}
