//! Built-in native skills for the Chorus framework.
//!
//! Illustrative, low-risk skills (file read/write under path validation,
//! HTTP fetch with SSRF guarding, shell execution with pattern blocking)
//! used to exercise the skill registry and agent tool loop.

/// File read skill.
pub mod file_read;
/// File write skill.
pub mod file_write;
/// HTTP fetch skill.
pub mod http_fetch;
/// Shell command execution skill.
pub mod shell;

pub use file_read::FileReadSkill;
pub use file_write::FileWriteSkill;
pub use http_fetch::HttpFetchSkill;
pub use shell::ShellSkill;

use chorus_skills::SkillRegistry;
use std::sync::Arc;

/// Register the standard set of built-in skills into a registry.
pub fn register_builtins(registry: &mut SkillRegistry) {
    registry.register(Arc::new(ShellSkill::new()));
    registry.register(Arc::new(FileReadSkill::new()));
    registry.register(Arc::new(FileWriteSkill::new()));
    registry.register(Arc::new(HttpFetchSkill::new()));
}
