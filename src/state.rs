use std::{collections::{HashMap, HashSet}, time::Duration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

pub type ConnId = Uuid;

/* ------------ participants -------------- */
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id:        String,
    pub username:       String,
    pub last_heartbeat: Instant,
    /// connection the user was last seen on, so kicks can unsubscribe it
    pub conn:           Option<ConnId>,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, conn: Option<ConnId>) -> Self {
        Self {
            user_id:        user_id.into(),
            username:       username.into(),
            last_heartbeat: Instant::now(),
            conn,
        }
    }

    pub fn touch(&mut self) { self.last_heartbeat = Instant::now(); }

    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }

    pub fn view(&self) -> UserView {
        UserView { user_id: self.user_id.clone(), username: self.username.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id:  String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    pub host:  UserView,
    pub users: Vec<UserView>,
}

/* ------------ songs -------------- */

/// A song suggestion. Only `uri` is interpreted; everything else rides along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongCandidate {
    pub uri: String,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl SongCandidate {
    pub fn is_valid(&self) -> bool { !self.uri.trim().is_empty() }
}

/* ------------ phase cycle -------------- */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Request,
    Vote,
}

impl Phase {
    pub const CYCLE: [Phase; 2] = [Phase::Request, Phase::Vote];

    pub fn index(self) -> usize {
        match self { Phase::Request => 0, Phase::Vote => 1 }
    }

    pub fn next(self) -> Phase {
        Self::CYCLE[(self.index() + 1) % Self::CYCLE.len()]
    }
}

/// `current == None` means idle.
#[derive(Debug, Default)]
pub struct PhaseState {
    pub current: Option<Phase>,
    /// bumped on every start/stop; timer callbacks from an older epoch are stale
    pub epoch:   u64,
    pub timer:   Option<JoinHandle<()>>,
}

impl PhaseState {
    pub fn is_running(&self) -> bool { self.timer.is_some() }

    /// Cancels the timer and returns to idle.
    pub fn halt(&mut self) {
        if let Some(t) = self.timer.take() { t.abort(); }
        self.current = None;
        self.epoch += 1;
    }
}

/* ------------ room -------------- */
#[derive(Debug)]
pub struct Room {
    pub code:            String,
    pub started_at:      DateTime<Utc>,
    pub host:            Participant,
    pub members:         Vec<Participant>,
    pub phase:           PhaseState,
    pub song_requests:   Vec<SongCandidate>,
    /// every uri ever requested here; outlives the per-phase request list
    pub submitted:       HashSet<String>,
    pub votes:           HashMap<String, u32>,
    pub queue:           Vec<Value>,
    pub heartbeat_timer: Option<JoinHandle<()>>,
}

impl Room {
    pub fn new(code: String, host: Participant) -> Self {
        Self {
            code,
            started_at:      Utc::now(),
            host,
            members:         Vec::new(),
            phase:           PhaseState::default(),
            song_requests:   Vec::new(),
            submitted:       HashSet::new(),
            votes:           HashMap::new(),
            queue:           Vec::new(),
            heartbeat_timer: None,
        }
    }

    pub fn is_host(&self, user_id: &str) -> bool { self.host.user_id == user_id }

    pub fn member(&self, user_id: &str) -> Option<&Participant> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Host or member.
    pub fn knows(&self, user_id: &str) -> bool {
        self.is_host(user_id) || self.member(user_id).is_some()
    }

    pub fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        if self.host.user_id == user_id {
            return Some(&mut self.host);
        }
        self.members.iter_mut().find(|m| m.user_id == user_id)
    }

    pub fn remove_member(&mut self, user_id: &str) -> Option<Participant> {
        let idx = self.members.iter().position(|m| m.user_id == user_id)?;
        Some(self.members.remove(idx))
    }

    pub fn roster(&self) -> Roster {
        Roster {
            host:  self.host.view(),
            users: self.members.iter().map(Participant::view).collect(),
        }
    }

    /// Aborts the phase and heartbeat tasks.
    pub fn cancel_timers(&mut self) {
        self.phase.halt();
        if let Some(t) = self.heartbeat_timer.take() { t.abort(); }
    }
}

impl Drop for Room {
    fn drop(&mut self) { self.cancel_timers(); }
}
