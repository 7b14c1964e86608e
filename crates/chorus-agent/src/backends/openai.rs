use crate::config::{LlmProvider, ModelConfig};
use chorus_core::{ChorusError, ChorusResult, Message, ToolCall};
use chorus_mcp::{LlmBackend, LlmResponse};
use chorus_skills::SkillDescriptor;
use async_trait::async_trait;

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, and Groq — any provider implementing the
/// OpenAI chat completions API shape.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { text } => serde_json::json!({"role": "system", "content": text}),
                Message::User { text } => serde_json::json!({"role": "user", "content": text}),
                Message::Assistant { text } => serde_json::json!({"role": "assistant", "content": text}),
                Message::AssistantToolCall { .. } => {
                    serde_json::json!({"role": "assistant", "content": m.as_text()})
                }
                Message::ToolResponse { .. } => {
                    serde_json::json!({"role": "user", "content": m.as_text()})
                }
            })
            .collect()
    }

    fn build_tools(&self, tools: &[SkillDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/chorus-orchestrator/chorus")
                .header("X-Title", "Chorus")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[SkillDescriptor],
    ) -> ChorusResult<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let api_messages = self.build_messages(messages);

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "messages": api_messages,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        let request = self.add_provider_headers(self.http.post(&url));

        let resp = request
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
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

fn parse_openai_response(body: &serde_json::Value) -> ChorusResult<LlmResponse> {
    let choice = &body["choices"][0];
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let arguments: serde_json::Value =
                    serde_json::from_str(tc["function"]["arguments"].as_str()?).unwrap_or_default();
                Some(ToolCall { id, name, arguments })
            })
            .collect();

        Ok(LlmResponse::Tool(tool_calls))
    } else {
        Ok(LlmResponse::Text(content))
    }
}
