use std::collections::HashMap;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::info;

use super::Coordinator;
use crate::{
    error::{RoomErr, RoomResult},
    events::ServerEvent,
    state::{ConnId, Participant, Phase, Room, SongCandidate},
};

/// Owns every active room, keyed by its 6-digit code.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    /// Draws codes until one is free; generation and insert happen under
    /// the same `&mut self`.
    pub fn create<R: Rng>(&mut self, rng: &mut R, host: Participant) -> &mut Room {
        let code = loop {
            let c = rng.gen_range(100_000..=999_999u32).to_string();
            if !self.rooms.contains_key(&c) { break c; }
        };
        self.rooms.entry(code.clone()).or_insert_with(|| Room::new(code, host))
    }

    pub fn get(&self, code: &str) -> RoomResult<&Room> {
        self.rooms.get(code).ok_or_else(|| RoomErr::RoomNotFound(code.into()))
    }

    pub fn get_mut(&mut self, code: &str) -> RoomResult<&mut Room> {
        self.rooms.get_mut(code).ok_or_else(|| RoomErr::RoomNotFound(code.into()))
    }

    /// Cancels the room's timers and drops it. Absent codes are fine.
    pub fn remove(&mut self, code: &str) -> Option<Room> {
        let mut room = self.rooms.remove(code)?;
        room.cancel_timers();
        Some(room)
    }

    pub fn len(&self) -> usize { self.rooms.len() }

    pub fn snapshot(&self) -> StatusReport {
        let now = Instant::now();
        let wall = Utc::now();
        let mut rooms: Vec<RoomStatus> = self.rooms.values().map(|r| room_status(r, now, wall)).collect();
        rooms.sort_by(|a, b| a.code.cmp(&b.code));

        StatusReport {
            number_of_servers: rooms.len(),
            total_users:       rooms.iter().map(|r| r.users.len() + 1).sum(),
            rooms,
        }
    }

    pub fn room_status(&self, code: &str) -> Option<RoomStatus> {
        self.rooms.get(code).map(|r| room_status(r, Instant::now(), Utc::now()))
    }
}

fn room_status(r: &Room, now: Instant, wall: DateTime<Utc>) -> RoomStatus {
    RoomStatus {
        code:          r.code.clone(),
        start_time:    r.started_at,
        uptime_secs:   (wall - r.started_at).num_seconds().max(0),
        host:          liveness(&r.host, now, wall),
        users:         r.members.iter().map(|m| liveness(m, now, wall)).collect(),
        phase:         r.phase.current,
        song_requests: r.song_requests.clone(),
        votes:         r.votes.clone(),
        queue:         r.queue.clone(),
    }
}

fn liveness(p: &Participant, now: Instant, wall: DateTime<Utc>) -> LivenessView {
    let ago = chrono::Duration::from_std(now.saturating_duration_since(p.last_heartbeat))
        .unwrap_or_else(|_| chrono::Duration::zero());
    LivenessView {
        user_id:        p.user_id.clone(),
        username:       p.username.clone(),
        last_heartbeat: wall - ago,
    }
}

/* ------------ status snapshot -------------- */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub number_of_servers: usize,
    pub total_users:       usize,
    pub rooms:             Vec<RoomStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub code:          String,
    pub start_time:    DateTime<Utc>,
    pub uptime_secs:   i64,
    pub host:          LivenessView,
    pub users:         Vec<LivenessView>,
    pub phase:         Option<Phase>,
    pub song_requests: Vec<SongCandidate>,
    pub votes:         HashMap<String, u32>,
    pub queue:         Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessView {
    pub user_id:        String,
    pub username:       String,
    pub last_heartbeat: DateTime<Utc>,
}

/* ------------ create / end -------------- */
impl Coordinator {
    pub async fn create_room(&self, conn: ConnId, user_id: &str, username: &str) -> RoomResult<String> {
        let mut reg = self.lock().await;
        let host = Participant::new(user_id, username, Some(conn));
        let room = reg.create(&mut rand::thread_rng(), host);
        let code = room.code.clone();
        room.heartbeat_timer = Some(self.arm_heartbeat(code.clone()));
        let roster = room.roster();

        self.gateway.subscribe(conn, &code);
        self.gateway.reply(conn, &ServerEvent::ServerCreated { server_code: code.clone() });
        self.gateway.broadcast(&code, &ServerEvent::UpdateUsers(roster));
        info!(room = %code, user = user_id, rooms = reg.len(), "room created");
        Ok(code)
    }

    /// Host-only explicit end of the session.
    pub async fn end_session(&self, code: &str, user_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        if !reg.get(code)?.is_host(user_id) {
            return Err(RoomErr::NotAuthorized);
        }
        self.teardown(&mut reg, code, ServerEvent::SessionEnded { server_code: code.into() });
        Ok(())
    }
}
