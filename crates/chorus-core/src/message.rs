use serde::{Deserialize, Serialize};

/// A request from the LLM to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the LLM for this tool call, echoed back in
    /// the corresponding [`ToolResult`] so the MCP can pair request/response.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Builds a tool call with a fresh id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of executing a [`ToolCall`], represented as a tagged union
/// rather than a flat `{content, is_error}` struct so that callers must
/// match both arms instead of inspecting a boolean flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ToolResult {
    /// The tool executed successfully.
    Ok {
        /// Id of the [`ToolCall`] this result answers.
        call_id: String,
        /// The tool's output value.
        value: serde_json::Value,
    },
    /// The tool raised an error. Tool errors do not abort the agent loop —
    /// they are fed back to the LLM as a tool-response message.
    Err {
        /// Id of the [`ToolCall`] this result answers.
        call_id: String,
        /// Human-readable error message.
        message: String,
        /// Optional structured error detail.
        details: Option<serde_json::Value>,
    },
}

impl ToolResult {
    /// Builds a successful result.
    pub fn ok(call_id: impl Into<String>, value: serde_json::Value) -> Self {
        ToolResult::Ok {
            call_id: call_id.into(),
            value,
        }
    }

    /// Builds an error result.
    pub fn err(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        ToolResult::Err {
            call_id: call_id.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Alias for [`ToolResult::ok`] accepting anything JSON-serializable as
    /// the value, so skills can pass a bare string or number directly.
    pub fn success(call_id: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::ok(call_id, value.into())
    }

    /// Alias for [`ToolResult::err`].
    pub fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::err(call_id, message)
    }

    /// The id of the [`ToolCall`] this result answers, regardless of arm.
    pub fn call_id(&self) -> &str {
        match self {
            ToolResult::Ok { call_id, .. } | ToolResult::Err { call_id, .. } => call_id,
        }
    }

    /// Whether this result represents a tool-side error.
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Err { .. })
    }
}

/// A `{name, response}` pair as fed back into the MCP after a tool call,
/// per the tool-response framing in spec §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseEntry {
    /// Name of the tool that was invoked.
    pub name: String,
    /// The JSON value returned (success value, or `{error: ...}`).
    pub response: serde_json::Value,
}

/// A single entry in an MCP conversation buffer.
///
/// Modeled as tagged variants (spec §9 "Context messages with polymorphic
/// payloads → tagged variants") rather than a flat `{role, content}`
/// struct, so an `AssistantToolCall` cannot be mistaken for plain text and
/// a `ToolResponse` always carries its `{name, response}` pairs typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// The single system instruction. At most one, and only at index 0
    /// of a context buffer.
    System {
        /// Instruction text.
        text: String,
    },
    /// A user-authored turn (the initial prompt, or a forced continuation
    /// prompt such as "tools executed; produce final answer or call more").
    User {
        /// Turn text.
        text: String,
    },
    /// A plain assistant text turn.
    Assistant {
        /// Turn text.
        text: String,
    },
    /// An assistant turn that requested one or more tool calls instead of
    /// (or alongside) text.
    AssistantToolCall {
        /// The tool calls requested.
        calls: Vec<ToolCall>,
    },
    /// The tool responses fed back after executing an `AssistantToolCall`.
    ToolResponse {
        /// One entry per tool call that was executed.
        entries: Vec<ToolResponseEntry>,
    },
}

impl Message {
    /// Convenience constructor for a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Message::System { text: text.into() }
    }

    /// Convenience constructor for a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Message::User { text: text.into() }
    }

    /// Convenience constructor for an assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant { text: text.into() }
    }

    /// Whether this is the (sole, index-0) system message.
    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    /// The content rendered as a single string, for token-estimation and
    /// for providers that only understand flat text (used as the fallback
    /// serialization referenced in spec §4.4's "degrade gracefully to
    /// text" rule).
    pub fn as_text(&self) -> String {
        match self {
            Message::System { text } | Message::User { text } | Message::Assistant { text } => {
                text.clone()
            }
            Message::AssistantToolCall { calls } => {
                serde_json::to_string(calls).unwrap_or_default()
            }
            Message::ToolResponse { entries } => serde_json::to_string(entries).unwrap_or_default(),
        }
    }
}
