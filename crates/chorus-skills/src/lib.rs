//! Tool Registry: named, schema-typed side-effecting capabilities invoked
//! by agents during the Agent Runtime's tool loop (spec §4.7/§6 "tool
//! implementations").
//!
//! A [`Skill`] is anything an agent can call by name with JSON arguments
//! and get back a [`chorus_core::ToolResult`]. The [`SkillRegistry`]
//! resolves calls by name, enforces the capability checks each skill
//! declares, and supports progressive tool-whitelist disclosure via
//! named [`ToolGroup`]s.
//!
//! # Main types
//!
//! - [`Skill`] — trait every tool implements.
//! - [`SkillDescriptor`] — name, description, JSON-schema parameters, required capabilities.
//! - [`SkillRegistry`] — central registry, capability-checked dispatch, tool groups.
//! - [`ToolGroup`] — named subset of the registry for whitelist disclosure.

/// Central skill registry and tool groups.
pub mod registry;
/// Core skill trait and descriptor.
pub mod skill;

pub use registry::{default_tool_groups, SkillRegistry, ToolGroup};
pub use skill::{Skill, SkillDescriptor};
