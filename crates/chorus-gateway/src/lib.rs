//! The external HTTP/SSE surface: REST task CRUD plus a `/events`
//! subscription feed, layered with optional API-key auth and
//! token-bucket rate limiting (spec §6).
//!
//! # Main types
//!
//! - [`GatewayServer`] — Builds the Axum `Router` over a [`chorus_orchestrator::TaskSupervisor`].
//! - [`AuthConfig`] — API-key authentication configuration.

/// Authentication and rate-limiting middleware.
pub mod middleware;
/// REST and SSE route handlers.
pub mod router;
/// Gateway server builder.
pub mod server;

pub use middleware::AuthConfig;
pub use server::GatewayServer;
