//! Two-phase cycle (request → vote → request …) per room.
//!
//! One task per running room owns the deadline for the current phase.
//! Countdown ticks are cosmetic; only the deadline ends a phase.
use std::time::Duration;
use tokio::{task::JoinHandle, time::{self, Instant, MissedTickBehavior}};
use tracing::{debug, info};

use super::Coordinator;
use crate::{
    error::{RoomErr, RoomResult},
    events::ServerEvent,
    state::{Phase, Room},
};

impl Coordinator {
    pub fn phase_duration(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Request => self.cfg.request_phase,
            Phase::Vote    => self.cfg.vote_phase,
        }
    }

    /// Host-only. Restarting cancels the running timer before arming a new one.
    pub async fn start_phases(&self, code: &str, user_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if !room.is_host(user_id) {
            return Err(RoomErr::NotAuthorized);
        }

        room.phase.halt();
        let first = Phase::CYCLE[0];
        let epoch = room.phase.epoch;
        self.enter(room, first);
        room.phase.timer = Some(self.arm_phase(code.into(), epoch, first));
        info!(room = code, epoch, "phase cycle started");
        Ok(())
    }

    /// Host-only. Idle rooms are left as they are.
    pub async fn stop_phases(&self, code: &str, user_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if !room.is_host(user_id) {
            return Err(RoomErr::NotAuthorized);
        }
        if room.phase.is_running() {
            room.phase.halt();
            info!(room = code, "phase cycle stopped");
        }
        Ok(())
    }

    /// Entry side effects for `phase`, then announce it.
    fn enter(&self, room: &mut Room, phase: Phase) {
        match phase {
            Phase::Request => room.song_requests.clear(),
            Phase::Vote    => room.votes.clear(),
        }
        room.phase.current = Some(phase);
        self.gateway.broadcast(&room.code, &ServerEvent::PhaseStarted {
            phase,
            duration_secs: self.phase_duration(phase).as_secs(),
        });
    }

    fn arm_phase(&self, code: String, epoch: u64, first: Phase) -> JoinHandle<()> {
        let this = self.clone();
        let every = self.cfg.countdown_tick;
        tokio::spawn(async move {
            let mut phase = first;
            // each deadline follows from the previous one, not from when the
            // lock was finally acquired
            let mut deadline = Instant::now() + this.phase_duration(phase);
            loop {
                let expiry = time::sleep_until(deadline);
                tokio::pin!(expiry);
                let mut tick = time::interval_at(Instant::now() + every, every);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        biased;
                        _ = &mut expiry => break,
                        _ = tick.tick() => {
                            let left = deadline.saturating_duration_since(Instant::now());
                            if !this.countdown(&code, epoch, phase, left).await { return; }
                        }
                    }
                }

                match this.phase_expired(&code, epoch, phase).await {
                    Some(next) => {
                        deadline += this.phase_duration(next);
                        phase = next;
                    }
                    None => return,
                }
            }
        })
    }

    fn is_current(room: &Room, epoch: u64, phase: Phase) -> bool {
        room.phase.epoch == epoch && room.phase.current == Some(phase)
    }

    /// Cosmetic tick; false when the room or epoch is gone.
    async fn countdown(&self, code: &str, epoch: u64, phase: Phase, left: Duration) -> bool {
        let reg = self.lock().await;
        let Ok(room) = reg.get(code) else { return false };
        if !Self::is_current(room, epoch, phase) { return false; }
        self.gateway.broadcast(code, &ServerEvent::CountdownUpdate {
            phase,
            remaining_secs: left.as_secs(),
        });
        true
    }

    /// Deadline reached: end `phase`, enter the next one. `None` means the
    /// callback is stale (room gone, stopped or restarted) and nothing happened.
    pub(super) async fn phase_expired(&self, code: &str, epoch: u64, phase: Phase) -> Option<Phase> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code).ok()?;
        if !Self::is_current(room, epoch, phase) {
            debug!(room = code, epoch, "stale phase timer ignored");
            return None;
        }

        self.gateway.broadcast(code, &ServerEvent::TimerEnded { phase });
        let next = phase.next();
        self.enter(room, next);
        debug!(room = code, ?next, "phase advanced");
        Some(next)
    }
}
