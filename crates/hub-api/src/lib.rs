//! hub-api: HTTP API for Agent Hub
//!
//! Provides REST API endpoints over the orchestrator and the fast task
//! service. Built with axum for async HTTP handling.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{AppState, app, start_server};
