pub mod handlers;
pub mod ws;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route(
            "/files",
            get(handlers::handle_list_files).post(handlers::handle_publish_files),
        )
        .route("/file/{index}", get(handlers::handle_get_file));

    Router::new()
        .nest("/api", api_routes)
        .fallback(handlers::handle_fallback)
        .layer(cors)
        .with_state(state)
}

pub async fn serve(
    state: ApiState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "rendezvous server listening");
    serve_listener(listener, state, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("rendezvous server stopped");
    Ok(())
}
