use anyhow::Result;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the application router.
///
/// `/chat` and `/history` sit behind rate limiting and then auth; `/health` is
/// open. Every response passes through CORS and the request log.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/chat", post(handlers::handle_chat))
        .route("/history", get(handlers::handle_history))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_api_key))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .route("/health", get(handlers::handle_health))
        .merge(protected)
        .layer(from_fn(middleware::cors))
        .layer(from_fn(middleware::log_requests))
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM. Open streams are allowed to finish.
pub async fn run_http(state: AppState, bind_addr: &str) -> Result<()> {
    let sweeper = state.limiter.spawn_sweeper();
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("chatrelay listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("chatrelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for Ctrl+C");
    }
    tracing::info!("shutting down");
}
