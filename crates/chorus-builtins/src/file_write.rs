use chorus_core::{ChorusResult, ToolCall, ToolResult};
use chorus_security::Capability;
use chorus_skills::skill::{Skill, SkillDescriptor};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const MAX_WRITE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// File writing skill. Writes content to files with path validation.
pub struct FileWriteSkill {
    descriptor: SkillDescriptor,
}

impl FileWriteSkill {
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "file_write".to_string(),
                description: "Write content to a file. Path must be within allowed directories."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Absolute path to the file to write"
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write to the file"
                        },
                        "append": {
                            "type": "boolean",
                            "description": "Append to file instead of overwriting (default: false)"
                        },
                        "create_dirs": {
                            "type": "boolean",
                            "description": "Create parent directories if they don't exist (default: false)"
                        }
                    },
                    "required": ["path", "content"]
                }),
                required_capabilities: vec![Capability::FileWrite {
                    allowed_paths: vec![], // Configured at runtime
                }],
            },
        }
    }
}

impl Default for FileWriteSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for FileWriteSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> ChorusResult<ToolResult> {
        let path_str = call.arguments["path"].as_str().unwrap_or_default();

        if path_str.is_empty() {
            return Ok(ToolResult::error(&call.id, "Empty path"));
        }

        let content = call.arguments["content"].as_str().unwrap_or_default();
        let append = call.arguments["append"].as_bool().unwrap_or(false);
        let create_dirs = call.arguments["create_dirs"].as_bool().unwrap_or(false);

        // Size check
        if content.len() > MAX_WRITE_SIZE {
            return Ok(ToolResult::error(
                &call.id,
                format!(
                    "Content too large: {} bytes (max: {} bytes)",
                    content.len(),
                    MAX_WRITE_SIZE
                ),
            ));
        }

        let path = Path::new(path_str);

        // Must be absolute
        if !path.is_absolute() {
            return Ok(ToolResult::error(
                &call.id,
                format!("Path must be absolute: '{path_str}'"),
            ));
        }

        // Block writing to sensitive locations
        let blocked_patterns = [
            "/etc/",
            "/usr/",
            "/bin/",
            "/sbin/",
            "/boot/",
            "/proc/",
            "/sys/",
            ".ssh/",
            ".env",
            ".bashrc",
            ".zshrc",
            ".profile",
            ".gitconfig",
            "credentials",
            "id_rsa",
            "id_ed25519",
        ];

        let path_lower = path_str.to_lowercase();
        for pattern in &blocked_patterns {
            if path_lower.contains(pattern) {
                return Ok(ToolResult::error(
                    &call.id,
                    format!("Access denied: '{path_str}' matches blocked pattern"),
                ));
            }
        }

        // Block writing executable files
        let blocked_extensions = [".sh", ".bash", ".exe", ".bat", ".cmd", ".ps1"];
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext_lower = format!(".{}", ext.to_lowercase());
            if blocked_extensions.contains(&ext_lower.as_str()) {
                return Ok(ToolResult::error(
                    &call.id,
                    format!(
                        "Access denied: writing executable files ({ext_lower}) is not allowed"
                    ),
                ));
            }
        }

        // Create parent directories if requested
        if create_dirs {
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(ToolResult::error(
                        &call.id,
                        format!("Failed to create directories for '{path_str}': {e}"),
                    ));
                }
            }
        }

        // Write or append
        let result = if append {
            use tokio::io::AsyncWriteExt;
            let mut file = match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
            {
                Ok(f) => f,
                Err(e) => {
                    return Ok(ToolResult::error(
                        &call.id,
                        format!("Failed to open '{path_str}' for append: {e}"),
                    ));
                }
            };
            file.write_all(content.as_bytes()).await
        } else {
            tokio::fs::write(path, content).await
        };

        match result {
            Ok(()) => {
                info!(path = %path_str, size = content.len(), append = append, "File written");
                let response = serde_json::json!({
                    "path": path_str,
                    "bytes_written": content.len(),
                    "append": append,
                });
                Ok(ToolResult::success(&call.id, response.to_string()))
            }
            Err(e) => Ok(ToolResult::error(
                &call.id,
                format!("Failed to write '{path_str}': {e}"),
            )),
        }
    }
}
