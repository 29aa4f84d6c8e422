//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes::{health, orders};
use crate::app::CoreApp;

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Cancelled on shutdown; in-flight list queries race against it
    pub cancel: CancellationToken,
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;
        let shutdown = app.shutdown.clone();

        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let state = AppState {
            pool: app.database.pool().clone(),
            cancel: shutdown.cancellation_token(),
        };

        let router = Router::new()
            .route("/api/health", get(health::health))
            .nest("/api/orders", orders::routes(state))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);

        let wait = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { wait.wait().await })
            .await?;

        Ok(app)
    }
}
