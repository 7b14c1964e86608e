use chorus_core::Message;
use tracing::warn;

/// Provider-side role a [`RenderedMessage`] is addressed as (spec §4.4
/// "SDK formatting"): `system` and `assistant` both collapse to `Model`,
/// `user` and tool responses collapse to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    /// Provider role for system instructions and assistant turns.
    Model,
    /// Provider role for user turns and tool-response turns.
    User,
}

/// One piece of a [`RenderedMessage`]'s content.
#[derive(Debug, Clone)]
pub enum Part {
    /// Plain text content.
    Text(String),
    /// A tool-call request, re-emitted from an `AssistantToolCall` message.
    FunctionCall { name: String, args: serde_json::Value },
    /// A tool-call result, re-emitted from a `ToolResponse` message.
    FunctionResponse { name: String, response: serde_json::Value },
}

/// A message rendered into the LLM provider's role/part conventions,
/// ready for a concrete backend to serialize into its own wire format.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub role: ProviderRole,
    pub parts: Vec<Part>,
}

/// Renders the internal [`Message`] buffer into provider role
/// conventions (spec §4.4 "SDK formatting"). Malformed tool-call/response
/// payloads degrade gracefully to a text part with a logged warning
/// rather than failing the whole render.
pub fn render(messages: &[Message]) -> Vec<RenderedMessage> {
    messages.iter().map(render_one).collect()
}

fn render_one(message: &Message) -> RenderedMessage {
    match message {
        Message::System { text } => RenderedMessage {
            role: ProviderRole::Model,
            parts: vec![Part::Text(text.clone())],
        },
        Message::Assistant { text } => RenderedMessage {
            role: ProviderRole::Model,
            parts: vec![Part::Text(text.clone())],
        },
        Message::User { text } => RenderedMessage {
            role: ProviderRole::User,
            parts: vec![Part::Text(text.clone())],
        },
        Message::AssistantToolCall { calls } => {
            if calls.is_empty() {
                warn!("assistant tool-call message carried no calls; degrading to text");
                return RenderedMessage {
                    role: ProviderRole::Model,
                    parts: vec![Part::Text("Tool Call: []".to_string())],
                };
            }
            RenderedMessage {
                role: ProviderRole::Model,
                parts: calls
                    .iter()
                    .map(|c| Part::FunctionCall {
                        name: c.name.clone(),
                        args: c.arguments.clone(),
                    })
                    .collect(),
            }
        }
        Message::ToolResponse { entries } => {
            if entries.is_empty() {
                warn!("tool-response message carried no entries; degrading to text");
                return RenderedMessage {
                    role: ProviderRole::User,
                    parts: vec![Part::Text("[]".to_string())],
                };
            }
            RenderedMessage {
                role: ProviderRole::User,
                parts: entries
                    .iter()
                    .map(|e| Part::FunctionResponse {
                        name: e.name.clone(),
                        response: e.response.clone(),
                    })
                    .collect(),
            }
        }
    }
}
