use chorus_core::{ChorusResult, ToolCall, ToolResult};
use chorus_security::Capability;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata describing a skill's interface and required permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
    pub required_capabilities: Vec<Capability>,
}

/// Trait every named, schema-typed tool capability implements (spec §4.7).
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    async fn execute(&self, call: ToolCall) -> ChorusResult<ToolResult>;
}
