//! Read-only snapshots, no side effects
use axum::{routing::get, extract::{Extension, Path}, Json, Router};
use serde_json::{json, Value};

use crate::{
    coordinator::{Coordinator, RoomStatus, StatusReport},
    error::{AppErr, AppResult},
};

pub fn router() -> Router {
    Router::new()
        .route("/activeServers", get(active_servers))
        .route("/status", get(status))
        .route("/status/:code", get(room))
}

async fn active_servers(Extension(coord): Extension<Coordinator>) -> Json<Value> {
    Json(json!({ "numberOfServers": coord.room_count().await }))
}

async fn status(Extension(coord): Extension<Coordinator>) -> Json<StatusReport> {
    Json(coord.status().await)
}

async fn room(
    Extension(coord): Extension<Coordinator>,
    Path(code): Path<String>,
) -> AppResult<Json<RoomStatus>> {
    coord.room_status(&code).await
        .map(Json)
        .ok_or_else(|| AppErr::NotFound(format!("room {code}")))
}
