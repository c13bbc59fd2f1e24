//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use axum::Router;
use http::HeaderValue;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hub_core::{Config, FastTaskService, Orchestrator};

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub fast: Arc<FastTaskService>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<Orchestrator>, fast: Arc<FastTaskService>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            fast,
        }
    }
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}

/// Build the application router with all layers applied
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.api.allowed_origins.as_deref());

    Router::new()
        .merge(routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP API server
///
/// Runs until `shutdown` resolves, then drains in-flight requests.
pub async fn start_server<F>(state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if state.config.api.key.is_none() {
        warn!("api.key is not set, the HTTP API accepts unauthenticated requests");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.api.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP API stopped");
    Ok(())
}
