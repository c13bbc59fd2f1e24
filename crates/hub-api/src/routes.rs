//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::handlers::{
    agent_tasks, assign_task, clear_fast_cache, development, fast_metrics, fast_status,
    get_agent, get_fast_task, get_task, health, list_agents, list_tasks, register_agent,
    start_agent, status, stop_agent, submit_fast_task,
};
use crate::middleware::auth::auth_middleware;
use crate::server::AppState;

/// Create the API router
///
/// Everything under `/api` sits behind the key check, `/health` does not.
pub fn routes(state: AppState) -> Router<AppState> {
    let api = Router::new()
        // Orchestrator
        .route("/api/status", get(status))
        .route("/api/agents", get(list_agents).post(register_agent))
        .route("/api/agents/{agent_id}", get(get_agent))
        .route("/api/agents/{agent_id}/start", post(start_agent))
        .route("/api/agents/{agent_id}/stop", post(stop_agent))
        .route(
            "/api/agents/{agent_id}/tasks",
            get(agent_tasks).post(assign_task),
        )
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/{task_id}", get(get_task))
        .route("/api/development", get(development))
        // Fast task service
        .route("/api/fast/tasks", post(submit_fast_task))
        .route("/api/fast/tasks/{task_id}", get(get_fast_task))
        .route("/api/fast/status", get(fast_status))
        .route("/api/fast/metrics", get(fast_metrics))
        .route("/api/fast/cache", delete(clear_fast_cache))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check
        .route("/health", get(health))
        .merge(api)
}
