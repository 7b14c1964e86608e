use std::sync::Arc;

use axum::middleware as axum_mw;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use chorus_orchestrator::TaskSupervisor;
use chorus_security::RateLimiter;

use crate::middleware::{auth_middleware, rate_limit_middleware, AuthConfig, MiddlewareState};
use crate::router::{
    delete_task, events_stream, get_task, get_task_agents, list_tasks, submit_task, system_stats, update_task_priority,
    update_task_status,
};

/// Builds and serves the Chorus HTTP/SSE surface (spec §6).
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway router without auth or rate limiting.
    pub fn build(supervisor: Arc<TaskSupervisor>) -> Router {
        Self::build_with_middleware(supervisor, None, AuthConfig::new(vec![]))
    }

    /// Build the gateway router with optional rate limiting and auth.
    pub fn build_with_middleware(supervisor: Arc<TaskSupervisor>, rate_limiter: Option<Arc<RateLimiter>>, auth_config: AuthConfig) -> Router {
        let app = Router::new()
            .route("/tasks", get(list_tasks).post(submit_task))
            .route("/tasks/{id}", get(get_task).delete(delete_task))
            .route("/tasks/{id}/agents", get(get_task_agents))
            .route("/tasks/{id}/status", put(update_task_status))
            .route("/tasks/{id}/priority", put(update_task_priority))
            .route("/system/stats", get(system_stats))
            .route("/events", get(events_stream))
            .route("/health", get(health_handler))
            .with_state(supervisor);

        if rate_limiter.is_some() || auth_config.is_enabled() {
            let mw_state = Arc::new(MiddlewareState {
                rate_limiter: rate_limiter.unwrap_or_else(|| Arc::new(RateLimiter::new(1000.0, 1000.0))),
                auth: auth_config,
            });

            app.layer(axum_mw::from_fn_with_state(mw_state.clone(), rate_limit_middleware))
                .layer(axum_mw::from_fn_with_state(mw_state, auth_middleware))
        } else {
            app
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    serde_json::json!({"status": "ok", "service": "chorus"}).to_string()
}
