//! Security primitives for the Chorus orchestrator.
//!
//! Provides capabilities/permissions for the Tool Registry, an in-memory
//! audit trail, a token-bucket rate limiter for the HTTP surface, and
//! input sanitization for text crossing the HTTP boundary.
//!
//! # Main types
//!
//! - [`Capability`] — A fine-grained permission token (file, network, shell, etc.).
//! - [`PermissionSet`] — A collection of granted capabilities.
//! - [`RateLimiter`] — Token-bucket rate limiter for request throttling.
//! - [`AuditLog`] — Bounded in-memory audit trail of tool invocations.
//! - [`Sanitizer`] — Input sanitization utilities.

/// Audit logging module.
pub mod audit;
/// Capability and permission definitions.
pub mod capability;
/// Token-bucket rate limiting.
pub mod rate_limit;
/// Input sanitization utilities.
pub mod sanitizer;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use capability::{Capability, PermissionSet};
pub use rate_limit::RateLimiter;
pub use sanitizer::{SanitizeResult, Sanitizer};
