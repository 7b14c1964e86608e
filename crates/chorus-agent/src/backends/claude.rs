use crate::config::ModelConfig;
use chorus_core::{ChorusError, ChorusResult, Message, ToolCall};
use chorus_mcp::{LlmBackend, LlmResponse};
use chorus_skills::SkillDescriptor;
use async_trait::async_trait;
use serde::Serialize;

/// Claude (Anthropic) Messages API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ChorusResult<LlmResponse> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let system_prompt = messages.iter().find_map(|m| match m {
            Message::System { text } => Some(text.clone()),
            _ => None,
        });

        let api_messages: Vec<ClaudeMessage> = messages
            .iter()
            .filter(|m| !m.is_system())
            .map(to_claude_message)
            .collect();

        let claude_tools: Vec<ClaudeTool> = tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters_schema.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "messages": api_messages,
        });

        if let Some(sys) = &system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        if !claude_tools.is_empty() {
            body["tools"] = serde_json::to_value(&claude_tools)
                .map_err(|e| ChorusError::Agent(e.to_string()))?;
        }

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChorusError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChorusError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ChorusError::Http(format!(
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

fn to_claude_message(m: &Message) -> ClaudeMessage {
    match m {
        Message::User { text } => ClaudeMessage {
            role: "user".to_string(),
            content: text.clone(),
        },
        Message::Assistant { text } => ClaudeMessage {
            role: "assistant".to_string(),
            content: text.clone(),
        },
        Message::AssistantToolCall { .. } | Message::ToolResponse { .. } => ClaudeMessage {
            role: if matches!(m, Message::ToolResponse { .. }) {
                "user".to_string()
            } else {
                "assistant".to_string()
            },
            content: m.as_text(),
        },
        Message::System { text } => ClaudeMessage {
            role: "user".to_string(),
            content: text.clone(),
        },
    }
}

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

fn parse_claude_response(body: &serde_json::Value) -> ChorusResult<LlmResponse> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| ChorusError::Agent("Missing content in Claude response".into()))?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_string());
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"].as_str().unwrap_or_default().to_string();
                let arguments = block["input"].clone();
                tool_calls.push(ToolCall { id, name, arguments });
            }
            _ => {}
        }
    }

    if !tool_calls.is_empty() {
        Ok(LlmResponse::Tool(tool_calls))
    } else {
        Ok(LlmResponse::Text(text_parts.join("\n")))
    }
}
