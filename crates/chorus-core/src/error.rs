use std::time::Duration;
use thiserror::Error;

/// A convenience `Result` alias using [`ChorusError`].
pub type ChorusResult<T> = Result<T, ChorusError>;

/// Top-level error type for the Chorus framework.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum ChorusError {
    /// An error from the API gateway layer.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// An error originating from the agent execution loop.
    #[error("agent error: {0}")]
    Agent(String),

    /// An error raised by a skill during invocation.
    #[error("skill error: {0}")]
    Skill(String),

    /// A security-related error (permissions, sanitization, rate limiting).
    #[error("security error: {0}")]
    Security(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// The decomposition LLM returned a malformed or empty subtask graph.
    #[error("decomposition error: {0}")]
    Decomposition(String),

    /// A vector-store operation failed. Logged, never fatal to a run.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// An error from the workflow engine or task supervisor.
    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    /// The LLM provider rejected a request with a rate limit (HTTP 429).
    /// `retry_after` carries the provider-suggested delay, when present.
    #[error("llm rate limited")]
    LlmRateLimited {
        /// Provider-suggested retry delay, if the response included one.
        retry_after: Option<Duration>,
    },

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("http error: {0}")]
    Http(String),
}

impl ChorusError {
    /// Whether this error should be retried by a caller following the
    /// rate-limit backoff discipline: only 429s retry, everything else
    /// is terminal for that call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChorusError::LlmRateLimited { .. })
    }
}
