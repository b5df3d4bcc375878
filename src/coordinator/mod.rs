//! Room session coordinator.
//!
//! Each operation takes the registry lock, mutates at most one room, emits its
//! events through the gateway and releases the lock. Timer callbacks go
//! through the same lock, so nothing touching a room ever interleaves
//! mid-mutation. Nothing is awaited while the lock is held.
mod heartbeat;
mod membership;
mod phase;
mod registry;
mod tally;

pub use registry::{RoomStatus, StatusReport};
use registry::RoomRegistry;

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{
    config::Config,
    error::RoomErr,
    events::{ClientEvent, ServerEvent},
    gateway::SharedGateway,
    state::ConnId,
};

#[derive(Clone)]
pub struct Coordinator {
    rooms:   Arc<Mutex<RoomRegistry>>,
    gateway: SharedGateway,
    cfg:     Arc<Config>,
}

impl Coordinator {
    pub fn new(cfg: Config, gateway: SharedGateway) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(RoomRegistry::default())),
            gateway,
            cfg: Arc::new(cfg),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, RoomRegistry> { self.rooms.lock().await }

    /// Runs one inbound client action; failures are replied to `conn` only.
    pub async fn dispatch(&self, conn: ConnId, ev: ClientEvent) {
        use ClientEvent::*;
        let (op, res) = match ev {
            CreateServer { user_id, username } =>
                ("createServer", self.create_room(conn, &user_id, &username).await.map(drop)),
            JoinServer { server_code, user_id, username } =>
                ("joinServer", self.join(conn, &server_code, &user_id, &username).await),
            UpdateUser { server_code, user_id, username } =>
                ("updateUser", self.reconnect(conn, &server_code, &user_id, &username).await),
            LeaveServer { server_code, user_id } =>
                ("leaveServer", self.leave(&server_code, &user_id).await),
            KickUser { server_code, user_id, target_id } =>
                ("kickUser", self.kick(&server_code, &user_id, &target_id).await),
            GetUsers { server_code } =>
                ("getUsers", self.list_members(conn, &server_code).await),
            Heartbeat { server_code, user_id } =>
                ("heartbeat", self.heartbeat(conn, &server_code, &user_id).await),
            StartTimer { server_code, user_id } =>
                ("startTimer", self.start_phases(&server_code, &user_id).await),
            StopTimer { server_code, user_id } =>
                ("stopTimer", self.stop_phases(&server_code, &user_id).await),
            RequestSong { server_code, user_id, song } =>
                ("requestSong", self.submit_request(&server_code, &user_id, song).await),
            GetRequests { server_code } =>
                ("getRequests", self.get_requests(conn, &server_code).await),
            VoteSong { server_code, user_id, song_id, direction } =>
                ("voteSong", self.cast_vote(&server_code, &user_id, &song_id, direction).await),
            ResolveVote { server_code, user_id } =>
                ("resolveVote", self.resolve_vote(&server_code, &user_id).await.map(drop)),
            GetQueue { server_code } =>
                ("getQueue", self.get_queue(conn, &server_code).await),
            SetQueue { server_code, user_id, queue } =>
                ("setQueue", self.set_queue(&server_code, &user_id, queue).await),
            EndSession { server_code, user_id } =>
                ("endSession", self.end_session(&server_code, &user_id).await),
        };

        if let Err(err) = res {
            debug!(%conn, op, error = %err, "action rejected");
            self.gateway.reply(conn, &rejection(op, &err));
        }
    }

    /// Final broadcast, timer cancellation, removal, group shutdown.
    fn teardown(&self, reg: &mut RoomRegistry, code: &str, farewell: ServerEvent) {
        self.gateway.broadcast(code, &farewell);
        reg.remove(code);
        self.gateway.close_room(code);
        info!(room = code, rooms = reg.len(), "room closed");
    }

    pub async fn room_count(&self) -> usize { self.lock().await.len() }

    pub async fn status(&self) -> StatusReport { self.lock().await.snapshot() }

    pub async fn room_status(&self, code: &str) -> Option<RoomStatus> { self.lock().await.room_status(code) }
}

fn rejection(op: &str, err: &RoomErr) -> ServerEvent {
    match (op, err) {
        ("joinServer", RoomErr::RoomFull(code)) =>
            ServerEvent::ServerFull { server_code: code.clone() },
        ("joinServer", _) =>
            ServerEvent::JoinError { message: err.to_string() },
        ("leaveServer", RoomErr::RoomNotFound(_)) =>
            ServerEvent::LeaveError { message: err.to_string() },
        _ => ServerEvent::ActionError { kind: err.kind().into(), message: err.to_string() },
    }
}
