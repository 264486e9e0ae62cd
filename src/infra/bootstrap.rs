use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::{
    infra::{app_state::AppState, config::AppConfig, db},
    session,
};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file found, using process environment only");
    }
}

/// Attaches the layers every route expects (session resolution, request tracing) and binds the
/// state.
pub fn build_app(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    session::load_session,
                )),
        )
        .with_state(state)
}

/// Connects the pool, wires the router and serves until Ctrl-C.
pub async fn bootstrap(service_name: &str, routes: Router<AppState>, config: AppConfig) -> Result<()> {
    let db_pool = db::create_pool(&config.database).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db_pool,
        config: Arc::new(config),
    };

    let app = build_app(routes, state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("{} listening on {}", service_name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("{} shut down", service_name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}
