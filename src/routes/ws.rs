use std::sync::Arc;
use axum::{
    Router, routing::get, response::IntoResponse,
    extract::{ws::{WebSocketUpgrade, WebSocket, Message}, Extension},
};
use futures_util::{SinkExt, stream::StreamExt};
use tracing::{debug, info};

use crate::{
    coordinator::Coordinator,
    events::{ClientEvent, ServerEvent},
    gateway::{Gateway, Hub},
    state::ConnId,
};

pub fn router() -> Router {
    Router::new().route("/rooms", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(coord): Extension<Coordinator>,
    Extension(hub): Extension<Arc<Hub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |s| client_ws(s, coord, hub))
}

/* ---------------- per connection ---------------- */
async fn client_ws(sock: WebSocket, coord: Coordinator, hub: Arc<Hub>) {
    let (conn, mut rx) = hub.connect();
    let (mut sink, mut stream) = sock.split();
    info!(%conn, "socket opened");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() { break; }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(raw) => handle_frame(&coord, &hub, conn, &raw).await,
            Message::Close(_)  => break,
            _                  => {}
        }
    }

    /* leaving the socket only drops delivery; membership ends via leave/kick/timeout */
    hub.disconnect(conn);
    writer.abort();
    info!(%conn, "socket closed");
}

async fn handle_frame(coord: &Coordinator, hub: &Hub, conn: ConnId, raw: &str) {
    match ClientEvent::parse(raw) {
        Ok(ev) => coord.dispatch(conn, ev).await,
        Err(e) => {
            debug!(%conn, error = %e, "unreadable frame");
            hub.reply(conn, &ServerEvent::ActionError { kind: "badFrame".into(), message: e.to_string() });
        }
    }
}
