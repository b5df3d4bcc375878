use axum::Router;

pub mod status;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .nest("/api", status::router())
        .nest("/ws",  ws::router())
}
