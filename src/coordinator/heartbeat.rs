use tokio::{task::JoinHandle, time::{self, Instant}};
use tracing::{debug, info};

use super::Coordinator;
use crate::{
    error::RoomResult,
    events::ServerEvent,
    state::ConnId,
};

impl Coordinator {
    /// Unknown users in a known room are ignored; they are usually mid-reconnect.
    pub async fn heartbeat(&self, conn: ConnId, code: &str, user_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        match room.participant_mut(user_id) {
            Some(p) => {
                p.touch();
                self.gateway.reply(conn, &ServerEvent::HeartbeatReceived { user_id: user_id.into() });
            }
            None => debug!(room = code, user = user_id, "heartbeat from unknown user"),
        }
        Ok(())
    }

    /// Recurring liveness sweep for one room; ends once the room is gone.
    pub(super) fn arm_heartbeat(&self, code: String) -> JoinHandle<()> {
        let this = self.clone();
        let period = self.cfg.heartbeat_interval;
        tokio::spawn(async move {
            let mut tick = time::interval_at(Instant::now() + period, period);
            loop {
                tick.tick().await;
                if !this.sweep(&code).await { break; }
            }
        })
    }

    /// One pass: a stale host closes the room, stale members are evicted.
    /// Returns whether the room is still alive.
    pub async fn sweep(&self, code: &str) -> bool {
        let mut reg = self.lock().await;
        let timeout = self.cfg.heartbeat_timeout;
        let now = Instant::now();
        let Ok(room) = reg.get_mut(code) else { return false };

        if room.host.is_stale(now, timeout) {
            info!(room = code, "host timed out");
            self.teardown(&mut reg, code, ServerEvent::HostTimedOut { server_code: code.into() });
            return false;
        }

        // iterate a copy, the live list shrinks as we go
        let snapshot = room.members.clone();
        for m in snapshot.iter().filter(|m| m.is_stale(now, timeout)) {
            room.remove_member(&m.user_id);
            self.gateway.broadcast(code, &ServerEvent::UpdateUsers(room.roster()));
            self.gateway.broadcast(code, &ServerEvent::UserTimedOut { user_id: m.user_id.clone() });
            if let Some(c) = m.conn {
                self.gateway.unsubscribe(c, code);
            }
            info!(room = code, user = %m.user_id, "user timed out");
        }
        true
    }
}
