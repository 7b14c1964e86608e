use crate::backends::{ClaudeBackend, OpenAiBackend};
use crate::config::{LlmProvider, ModelConfig};
use crate::failover::FailoverBackend;
use chorus_core::{ChorusResult, Message};
use chorus_mcp::{LlmBackend, LlmResponse};
use chorus_skills::SkillDescriptor;
use async_trait::async_trait;

/// Builds the concrete backend for a single [`ModelConfig`].
fn build_backend(config: &ModelConfig) -> Box<dyn LlmBackend> {
    match config.provider {
        LlmProvider::Claude => Box::new(ClaudeBackend::new(config.clone())),
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Box::new(OpenAiBackend::new(config.clone()))
        }
    }
}

/// The top-level LLM client an agent is configured with.
///
/// Wraps the primary model plus any `fallback_models` behind a
/// [`FailoverBackend`], and implements [`chorus_mcp::LlmBackend`] directly so
/// it can be handed to an [`chorus_mcp::Mcp`] as-is.
pub struct LlmClient {
    backend: FailoverBackend,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let policy = config.retry_policy.clone().unwrap_or_default();
        let mut backends = vec![build_backend(&config)];
        for fallback in &config.fallback_models {
            backends.push(build_backend(fallback));
        }
        Self {
            backend: FailoverBackend::new(backends, policy),
        }
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn generate(&self, messages: &[Message], tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse> {
        self.backend.generate(messages, tools).await
    }
}
