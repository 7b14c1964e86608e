use chorus_core::{ChorusError, ChorusResult, Message};
use chorus_mcp::{LlmBackend, LlmResponse};
use chorus_skills::SkillDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Configures retry behaviour for failover across LLM backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per backend before moving to the next one.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Determines whether an error is transient and worth retrying.
pub fn is_retryable(err: &ChorusError) -> bool {
    if err.is_retryable() {
        return true;
    }

    let lower = err.to_string().to_lowercase();
    if lower.contains("400") {
        return false;
    }

    lower.contains("429")
        || lower.contains("401")
        || lower.contains("timeout")
        || lower.contains("5xx")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
}

fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// An `LlmBackend` implementation that wraps multiple backends and performs
/// automatic failover with exponential-backoff retries.
///
/// For each request it tries backends in order. Within each backend it retries
/// up to `max_retries` times for transient (retryable) errors. If all retries
/// on a backend are exhausted, or a non-retryable error is encountered, it
/// moves to the next backend. If every backend fails, the last error is
/// returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn LlmBackend>>,
    policy: RetryPolicy,
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FailoverBackend {
    /// Create a new failover backend with the given backends and retry policy.
    ///
    /// # Panics
    /// Panics if `backends` is empty.
    pub fn new(backends: Vec<Box<dyn LlmBackend>>, policy: RetryPolicy) -> Self {
        assert!(!backends.is_empty(), "FailoverBackend requires at least one backend");
        Self {
            backends,
            policy,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    /// Number of backends configured, in priority order.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl LlmBackend for FailoverBackend {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ChorusResult<LlmResponse> {
        let mut last_err: Option<ChorusError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            for attempt in 0..=self.policy.max_retries {
                match backend.generate(messages, tools).await {
                    Ok(resp) => return Ok(resp),
                    Err(e) => {
                        if !is_retryable(&e) {
                            warn!(
                                backend = backend_idx,
                                attempt,
                                error = %e,
                                "Non-retryable error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend_idx,
                                attempt,
                                delay_ms = delay,
                                error = %e,
                                "Retryable error, backing off"
                            );
                            self.do_sleep(delay).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ChorusError::Agent("All failover backends exhausted".into())))
    }
}
