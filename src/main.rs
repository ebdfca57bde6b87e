use std::net::SocketAddr;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use todos_server::{api, db::Db, settings::Settings};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Settings + store ───────────────────────────────────────
    let settings = Settings::load().expect("Failed to load settings");

    let db = Db::connect(&settings.database_url)
        .await
        .expect("Failed to open database");

    // One-shot, idempotent: tables + updated_at trigger.
    db.init_schema().await.expect("Failed to bootstrap schema");

    // ── Router ─────────────────────────────────────────────────
    let app = api::router(api::AppState { db })
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // ── Start ──────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", settings.tcp_socket_binding, settings.tcp_socket_port)
        .parse()
        .expect("Invalid bind address");

    tracing::info!("Server running on http://{addr}");
    tracing::info!("  Todos:  http://{addr}/api/todos");
    tracing::info!("  Stats:  http://{addr}/api/todos/stats");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
