//! Outbound delivery: room-wide broadcast or a reply to one connection.
use std::{collections::HashSet, sync::Arc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::{events::ServerEvent, state::ConnId};

pub type Tx = mpsc::UnboundedSender<String>;

/// Everything the coordinator needs from the transport. Calls never block.
pub trait Gateway: Send + Sync + 'static {
    fn broadcast(&self, room: &str, event: &ServerEvent);
    fn reply(&self, conn: ConnId, event: &ServerEvent);
    fn subscribe(&self, conn: ConnId, room: &str);
    fn unsubscribe(&self, conn: ConnId, room: &str);
    /// Forget the room's group; later broadcasts to it go nowhere.
    fn close_room(&self, room: &str);
}

pub type SharedGateway = Arc<dyn Gateway>;

/// In-process hub backing the websocket route.
#[derive(Default)]
pub struct Hub {
    conns:  DashMap<ConnId, Tx>,
    groups: DashMap<String, HashSet<ConnId>>,
}

impl Hub {
    pub fn connect(&self) -> (ConnId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnId::new_v4();
        self.conns.insert(id, tx);
        (id, rx)
    }

    pub fn disconnect(&self, conn: ConnId) {
        self.conns.remove(&conn);
        for mut g in self.groups.iter_mut() {
            g.value_mut().remove(&conn);
        }
    }

    fn send(&self, conn: ConnId, frame: &str) {
        let Some(tx) = self.conns.get(&conn) else { return };
        if tx.send(frame.to_owned()).is_err() {
            tracing::warn!(%conn, "dropping frame for closed connection");
        }
    }
}

impl Gateway for Hub {
    fn broadcast(&self, room: &str, event: &ServerEvent) {
        let Some(frame) = event.to_frame() else { return };
        let targets: Vec<ConnId> = match self.groups.get(room) {
            Some(g) => g.iter().copied().collect(),
            None    => return,
        };
        for conn in targets {
            self.send(conn, &frame);
        }
    }

    fn reply(&self, conn: ConnId, event: &ServerEvent) {
        if let Some(frame) = event.to_frame() {
            self.send(conn, &frame);
        }
    }

    fn subscribe(&self, conn: ConnId, room: &str) {
        self.groups.entry(room.to_owned()).or_default().insert(conn);
    }

    fn unsubscribe(&self, conn: ConnId, room: &str) {
        if let Some(mut g) = self.groups.get_mut(room) {
            g.remove(&conn);
        }
    }

    fn close_room(&self, room: &str) {
        self.groups.remove(room);
    }
}

/* ---------------- test double ---------------- */
