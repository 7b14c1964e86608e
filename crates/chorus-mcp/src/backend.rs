use async_trait::async_trait;
use chorus_core::{ChorusResult, Message, ToolCall};
use chorus_skills::SkillDescriptor;

/// The shape of one LLM turn, as a tagged sum type rather than a flat
/// `{content, tool_calls}` struct (spec §9 "Exceptions for control flow →
/// result types" / the `LlmResponse` redesign).
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// Plain text, no tool calls requested.
    Text(String),
    /// One or more tool calls requested instead of (or alongside) text.
    Tool(Vec<ToolCall>),
    /// A response the caller asked to be parsed as JSON and the provider
    /// returned cleanly structured content for (used by the decomposition
    /// and evaluation prompts, which always want a JSON object back).
    Structured(serde_json::Value),
}

/// Abstraction over "the LLM provider" (spec §1 "Out of scope... The LLM
/// provider itself"), invoked by the MCP's `generate_response` to drive
/// one turn of the conversation. Concrete HTTP-backed implementations
/// (Claude, OpenAI, a failover wrapper over several) live in
/// `chorus-agent`, which owns provider selection, retry, and failover;
/// this crate only needs the seam.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates the next turn given the full message history and the
    /// tool descriptors currently in scope for the calling agent.
    async fn generate(&self, messages: &[Message], tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse>;
}
