use serde::{Deserialize, Serialize};

/// A single `{rating, reason}` score, as emitted by the evaluator's
/// structured-rating LLM prompt (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    /// Score from 1 to 10.
    pub rating: u8,
    /// The rationale given for the score.
    pub reason: String,
}

impl Rating {
    /// Builds a rating, clamping into the valid 1..=10 range.
    pub fn new(rating: u8, reason: impl Into<String>) -> Self {
        Self {
            rating: rating.clamp(1, 10),
            reason: reason.into(),
        }
    }

    /// The minimum-score rating used when an agent errored or an
    /// evaluation LLM call failed irrecoverably.
    pub fn minimum(reason: impl Into<String>) -> Self {
        Rating::new(1, reason)
    }
}

/// Per-agent evaluation (spec §3 "Evaluation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvaluation {
    /// Id of the evaluated agent.
    pub agent_id: String,
    /// Correctness of the result against the assigned subtask.
    pub accuracy: Rating,
    /// Whether the result fully addresses the subtask.
    pub completeness: Rating,
    /// Internal consistency and clarity of the result.
    pub coherence: Rating,
    /// Deterministic score derived from execution time (spec §4.5).
    pub efficiency: Rating,
    /// Arithmetic mean of the four ratings above.
    pub overall: f64,
    /// Freeform feedback text.
    pub feedback: String,
}

impl AgentEvaluation {
    /// Computes `overall` as the mean of the four component ratings and
    /// builds the evaluation record.
    pub fn new(
        agent_id: impl Into<String>,
        accuracy: Rating,
        completeness: Rating,
        coherence: Rating,
        efficiency: Rating,
        feedback: impl Into<String>,
    ) -> Self {
        let overall = (accuracy.rating as f64
            + completeness.rating as f64
            + coherence.rating as f64
            + efficiency.rating as f64)
            / 4.0;
        Self {
            agent_id: agent_id.into(),
            accuracy,
            completeness,
            coherence,
            efficiency,
            overall,
            feedback: feedback.into(),
        }
    }

    /// Deterministic efficiency score from execution time (spec §4.5):
    /// `<1s → 9`, `<5s → 7`, else `4`.
    pub fn efficiency_for(execution_time_ms: i64) -> Rating {
        let rating = if execution_time_ms < 1_000 {
            9
        } else if execution_time_ms < 5_000 {
            7
        } else {
            4
        };
        Rating::new(rating, format!("executed in {execution_time_ms}ms"))
    }
}

/// System-level evaluation over an entire task run (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvaluation {
    /// Overall system rating, 1..=10.
    pub system_rating: u8,
    /// Freeform analysis text.
    pub analysis: String,
    /// Freeform recommendations text.
    pub recommendations: String,
}
