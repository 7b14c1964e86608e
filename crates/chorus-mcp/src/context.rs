use std::sync::Arc;

use chorus_core::{ChorusError, ChorusResult, Message, ToolCall};
use chorus_skills::SkillDescriptor;
use tracing::debug;

use crate::backend::{LlmBackend, LlmResponse};

/// Bounds on the conversation buffer an [`Mcp`] instance holds in scope
/// for one agent's run (spec §4.4 invariant I5: the context never grows
/// unbounded).
#[derive(Debug, Clone, Copy)]
pub struct McpConfig {
    /// Maximum number of messages retained, system message aside.
    pub max_messages: usize,
    /// Maximum estimated token count retained.
    pub max_tokens: usize,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            max_messages: 30,
            max_tokens: 8000,
        }
    }
}

/// Estimates token count for a message the same crude way across the
/// whole buffer so eviction decisions stay consistent: `ceil(chars / 4)`.
fn estimate_tokens(message: &Message) -> usize {
    let len = match message {
        Message::System { text } | Message::Assistant { text } | Message::User { text } => text.len(),
        Message::AssistantToolCall { calls } => calls
            .iter()
            .map(|c| c.name.len() + c.arguments.to_string().len())
            .sum(),
        Message::ToolResponse { entries } => entries
            .iter()
            .map(|e| e.name.len() + e.response.to_string().len())
            .sum(),
    };
    len.div_ceil(4)
}

/// The Model Context Protocol: a bounded, per-agent conversation buffer
/// plus the seam to the LLM provider that advances it one turn at a time
/// (spec §4.4). Distinct from the external Model Context Protocol JSON-RPC
/// tool-server convention; here it names the thing the spec names it:
/// the context an agent's model calls are scoped to.
pub struct Mcp {
    config: McpConfig,
    messages: Vec<Message>,
    backend: Arc<dyn LlmBackend>,
}

impl Mcp {
    /// Starts a new context ring seeded with a system instruction.
    pub fn new(backend: Arc<dyn LlmBackend>, system_instruction: impl Into<String>, config: McpConfig) -> Self {
        Self {
            config,
            messages: vec![Message::system(system_instruction)],
            backend,
        }
    }

    /// The messages currently retained, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Appends a message, then evicts the oldest non-system messages
    /// until both the message-count and estimated-token bounds are
    /// satisfied again, or until only the system message and one other
    /// remain, whichever comes first (spec §4.4). The seed system
    /// message is never evicted.
    pub fn add_to_context(&mut self, message: Message) {
        self.messages.push(message);
        self.enforce_bounds();
    }

    fn enforce_bounds(&mut self) {
        while self.messages.len() > 2
            && (self.messages.len() > self.config.max_messages || self.total_tokens() > self.config.max_tokens)
        {
            let evict_at = match self.messages.iter().position(|m| !m.is_system()) {
                Some(idx) => idx,
                None => break,
            };
            debug!(index = evict_at, "evicting oldest non-system message from context");
            self.messages.remove(evict_at);
        }
    }

    fn total_tokens(&self) -> usize {
        self.messages.iter().map(estimate_tokens).sum()
    }

    /// Drives one turn: sends the current buffer plus the tools in scope
    /// to the backend, appends the resulting assistant turn to the
    /// buffer, and returns it to the caller. The caller is responsible
    /// for executing any requested tool calls and feeding the results
    /// back in via [`Self::add_tool_responses`].
    pub async fn generate_response(&mut self, tools: &[SkillDescriptor]) -> ChorusResult<LlmResponse> {
        let response = self.backend.generate(&self.messages, tools).await?;
        match &response {
            LlmResponse::Text(text) => self.add_to_context(Message::assistant(text.clone())),
            LlmResponse::Structured(value) => self.add_to_context(Message::assistant(value.to_string())),
            LlmResponse::Tool(calls) => self.add_to_context(Message::AssistantToolCall { calls: calls.clone() }),
        }
        Ok(response)
    }

    /// Feeds the results of executed tool calls back into the context as
    /// a single `ToolResponse` turn.
    pub fn add_tool_responses(&mut self, entries: Vec<chorus_core::ToolResponseEntry>) {
        self.add_to_context(Message::ToolResponse { entries });
    }

    /// Convenience for call sites that only have raw tool calls and their
    /// results and want the response entries assembled for them.
    pub fn record_tool_results(&mut self, calls: &[ToolCall], results: &[chorus_core::ToolResult]) {
        let entries = calls
            .iter()
            .zip(results.iter())
            .map(|(call, result)| chorus_core::ToolResponseEntry {
                name: call.name.clone(),
                response: match result {
                    chorus_core::ToolResult::Ok { value, .. } => value.clone(),
                    chorus_core::ToolResult::Err { message, details, .. } => {
                        serde_json::json!({ "error": message, "details": details })
                    }
                },
            })
            .collect();
        self.add_tool_responses(entries);
    }
}

/// Maps a backend error into the system-message taxonomy the spec
/// describes for provider failures the caller chooses not to propagate
/// as a hard error (rate limits surfaced for retry by the caller instead;
/// everything else becomes a visible note in the transcript).
pub fn describe_backend_error(error: &ChorusError) -> String {
    if error.is_retryable() {
        format!("The model provider is rate-limited; retrying. ({error})")
    } else {
        format!("The model provider returned an error: {error}")
    }
}
