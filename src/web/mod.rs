//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServiceConfig;
use crate::scheduler::{RefreshScheduler, StatusCache};

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub cache: Arc<StatusCache>,
    pub scheduler: Arc<RefreshScheduler>,
}

/// Web server for ThermoWatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServiceConfig,
        cache: Arc<StatusCache>,
        scheduler: Arc<RefreshScheduler>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                cache,
                scheduler,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Status
            .route("/api/status", get(handlers::handle_get_status))
            .route("/api/devices", get(handlers::handle_get_devices))
            .route("/api/offline", get(handlers::handle_get_offline))
            // Refresh control
            .route("/api/refresh", post(handlers::handle_refresh))
            .route("/api/scheduler", get(handlers::handle_get_scheduler))
            .route("/api/scheduler/start", post(handlers::handle_start_scheduler))
            .route("/api/scheduler/stop", post(handlers::handle_stop_scheduler))
            .route("/api/scheduler/interval", put(handlers::handle_change_interval))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
