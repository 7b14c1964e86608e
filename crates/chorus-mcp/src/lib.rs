//! Model Context Protocol: the bounded per-agent conversation buffer the
//! Agent Runtime drives one turn at a time, plus the seam to the LLM
//! provider and the framing/parsing rules around it (spec §4.4).
//!
//! # Main types
//!
//! - [`Mcp`] / [`McpConfig`] — the bounded context buffer and its eviction limits.
//! - [`LlmBackend`] / [`LlmResponse`] — the provider seam; concrete backends live in `chorus-agent`.
//! - [`format::render`] — renders the internal message buffer into provider role/part conventions.
//! - [`parse::parse_json_response`] — recovers structured JSON from a raw model response.

/// The `LlmBackend` provider seam and its `LlmResponse` result type.
pub mod backend;
/// The bounded conversation buffer and its eviction/generation logic.
pub mod context;
/// Rendering the internal message buffer into provider role conventions.
pub mod format;
/// Recovering structured JSON from raw model text.
pub mod parse;

pub use backend::{LlmBackend, LlmResponse};
pub use context::{describe_backend_error, Mcp, McpConfig};
pub use format::{render, Part, ProviderRole, RenderedMessage};
pub use parse::parse_json_response;
