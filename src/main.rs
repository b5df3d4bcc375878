mod config;
mod coordinator;
mod error;
mod events;
mod gateway;
mod routes;
mod state;

use std::sync::Arc;
use axum::{Extension, extract::DefaultBodyLimit};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::{config::Config, coordinator::Coordinator, gateway::Hub};
use error::AppErr;

/* frames are small JSON; nothing legitimately needs more */
const BODY_LIMIT: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg   = Config::from_env()?;
    let hub   = Arc::new(Hub::default());
    let coord = Coordinator::new(cfg.clone(), hub.clone());

    let app = routes::router()
        .layer(Extension(coord))
        .layer(Extension(hub))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, capacity = cfg.room_capacity, "listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown())
        .await?;
    Ok(())
}

async fn shutdown() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
