use std::collections::HashMap;
use std::sync::Arc;

use chorus_core::{AgentEvaluation, AgentReport, AgentStatus, ChorusError, ChorusResult, Message, Rating, SystemEvaluation, Task};
use chorus_mcp::{parse::parse_json_response, LlmBackend, LlmResponse};
use chorus_memory::{EmbeddingProvider, VectorStoreGateway, KNOWLEDGE_BASE_COLLECTION};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Type alias for the injectable sleep function used in tests, mirroring
/// `chorus_agent::failover::FailoverBackend`'s pattern.
#[cfg(test)]
type SleepFn = Box<dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync>;

/// Retry policy for evaluation LLM calls (spec §4.5 "Retry policy").
#[derive(Debug, Clone)]
pub struct EvaluatorRetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for EvaluatorRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

fn compute_backoff(policy: &EvaluatorRetryPolicy, attempt: u32) -> u64 {
    let delay = policy.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.max_delay_ms)
}

#[derive(Deserialize)]
struct RawRating {
    rating: u8,
    reason: String,
}

#[derive(Deserialize)]
struct RawAgentRatings {
    accuracy: RawRating,
    completeness: RawRating,
    coherence: RawRating,
}

#[derive(Deserialize)]
struct RawSystemRatings {
    #[serde(rename = "systemRating")]
    system_rating: u8,
    analysis: String,
    recommendations: String,
}

/// Scores completed agent work and aggregates a system-level evaluation
/// (spec §4.5).
pub struct Evaluator {
    backend: Arc<dyn LlmBackend>,
    vector_store: Arc<dyn VectorStoreGateway>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: EvaluatorRetryPolicy,
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl Evaluator {
    pub fn new(backend: Arc<dyn LlmBackend>, vector_store: Arc<dyn VectorStoreGateway>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            backend,
            vector_store,
            embedder,
            retry: EvaluatorRetryPolicy::default(),
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }

    /// Invokes the backend, retrying on `LlmRateLimited` for a total of
    /// at most `retry.max_attempts` calls (the initial attempt plus
    /// retries), honoring a provider-suggested delay when present and
    /// otherwise backing off exponentially. Any other error is terminal
    /// for the call.
    async fn call_with_retry(&self, messages: &[Message]) -> ChorusResult<LlmResponse> {
        let mut attempt = 0u32;
        loop {
            match self.backend.generate(messages, &[]).await {
                Ok(response) => return Ok(response),
                Err(ChorusError::LlmRateLimited { retry_after }) if attempt + 1 < self.retry.max_attempts => {
                    let delay_ms = retry_after.map(|d| d.as_millis() as u64).unwrap_or_else(|| compute_backoff(&self.retry, attempt));
                    warn!(attempt, delay_ms, "evaluator LLM call rate-limited, retrying");
                    self.do_sleep(delay_ms).await;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Scores one completed or errored agent (spec §4.5 "Per-agent").
    pub async fn evaluate_agent(&self, report: &AgentReport, task_context: &str) -> AgentEvaluation {
        if report.status != AgentStatus::Completed {
            return AgentEvaluation::new(
                report.agent_id.clone(),
                Rating::minimum("agent did not complete successfully"),
                Rating::minimum("agent did not complete successfully"),
                Rating::minimum("agent did not complete successfully"),
                Rating::minimum("agent did not complete successfully"),
                format!("{} ended in status {:?}; no output to evaluate.", report.agent_id, report.status),
            );
        }

        let efficiency = AgentEvaluation::efficiency_for(report.execution_time_ms);
        let result_text = report
            .result
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(no result)".to_string());

        let rating_prompt = Message::user(format!(
            "Task context: {task_context}\n\nAgent {} produced:\n{result_text}\n\nReasoning: {}\n\n\
             Rate this work on accuracy, completeness, and coherence. Respond with a JSON object \
             {{\"accuracy\": {{\"rating\": 1-10, \"reason\": \"...\"}}, \"completeness\": {{...}}, \"coherence\": {{...}}}}.",
            report.agent_id, report.reasoning
        ));

        let (accuracy, completeness, coherence) = match self.call_with_retry(&[rating_prompt]).await {
            Ok(response) => match parse_agent_ratings(&response) {
                Some(raw) => (
                    Rating::new(raw.accuracy.rating, raw.accuracy.reason),
                    Rating::new(raw.completeness.rating, raw.completeness.reason),
                    Rating::new(raw.coherence.rating, raw.coherence.reason),
                ),
                None => {
                    let r = Rating::minimum("evaluation_llm_error: could not parse rating response");
                    (r.clone(), r.clone(), r)
                }
            },
            Err(err) => {
                let r = Rating::minimum(format!("evaluation_llm_error: {err}"));
                (r.clone(), r.clone(), r)
            }
        };

        let feedback_prompt = Message::user(format!(
            "Task context: {task_context}\n\nAgent {} produced:\n{result_text}\n\n\
             Give brief freeform feedback on this agent's work.",
            report.agent_id
        ));
        let feedback = match self.backend.generate(&[feedback_prompt], &[]).await {
            Ok(LlmResponse::Text(text)) => text,
            Ok(LlmResponse::Structured(value)) => value.to_string(),
            Ok(LlmResponse::Tool(_)) | Err(_) => String::new(),
        };

        AgentEvaluation::new(report.agent_id.clone(), accuracy, completeness, coherence, efficiency, feedback)
    }

    /// Aggregates per-agent evaluations into a system-level evaluation and
    /// persists it to the knowledge base (spec §4.5 "System-level").
    pub async fn evaluate_system(&self, task_id: Uuid, task: &Task, evaluations: &[AgentEvaluation]) -> SystemEvaluation {
        let average = if evaluations.is_empty() {
            0.0
        } else {
            evaluations.iter().map(|e| e.overall).sum::<f64>() / evaluations.len() as f64
        };

        let prompt = Message::user(format!(
            "Task: {}\nPer-agent average score: {average:.2}\nAgent count: {}\n\n\
             Provide a JSON object {{\"systemRating\": 1-10, \"analysis\": \"...\", \"recommendations\": \"...\"}} \
             summarizing how well the system as a whole handled this task.",
            task.description,
            evaluations.len()
        ));

        let evaluation = match self.call_with_retry(&[prompt]).await {
            Ok(response) => match parse_system_ratings(&response) {
                Some(raw) => SystemEvaluation {
                    system_rating: raw.system_rating.clamp(1, 10),
                    analysis: raw.analysis,
                    recommendations: raw.recommendations,
                },
                None => SystemEvaluation {
                    system_rating: 1,
                    analysis: "evaluation_llm_error: could not parse system evaluation response".to_string(),
                    recommendations: String::new(),
                },
            },
            Err(err) => SystemEvaluation {
                system_rating: 1,
                analysis: format!("evaluation_llm_error: {err}"),
                recommendations: String::new(),
            },
        };

        let document = serde_json::to_string(&evaluation).unwrap_or_default();
        let embedding = self.embedder.embed(&document).await.unwrap_or_default();
        let mut metadata = HashMap::new();
        metadata.insert("task_id".to_string(), serde_json::json!(task_id.to_string()));
        metadata.insert("system_rating".to_string(), serde_json::json!(evaluation.system_rating));
        if let Err(err) = self
            .vector_store
            .add(
                KNOWLEDGE_BASE_COLLECTION,
                vec![task_id.to_string()],
                vec![embedding],
                vec![metadata],
                vec![Some(document)],
            )
            .await
        {
            warn!(task_id = %task_id, error = %err, "failed to persist system evaluation to knowledge base");
        } else {
            info!(task_id = %task_id, rating = evaluation.system_rating, "persisted system evaluation");
        }

        evaluation
    }
}

fn parse_agent_ratings(response: &LlmResponse) -> Option<RawAgentRatings> {
    let value = response_to_value(response)?;
    serde_json::from_value(value).ok()
}

fn parse_system_ratings(response: &LlmResponse) -> Option<RawSystemRatings> {
    let value = response_to_value(response)?;
    serde_json::from_value(value).ok()
}

fn response_to_value(response: &LlmResponse) -> Option<serde_json::Value> {
    match response {
        LlmResponse::Structured(value) => Some(value.clone()),
        LlmResponse::Text(text) => parse_json_response(text),
        LlmResponse::Tool(_) => None,
    }
}
