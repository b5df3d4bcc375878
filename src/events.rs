//! Named events on the wire: `{"event": "<name>", "data": {...}}`.
use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{bad, AppResult},
    state::{Phase, Roster, SongCandidate, UserView},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteDirection {
    #[default]
    Affirm,
    Retract,
}

/* ---------------- client → server ---------------- */
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    CreateServer { user_id: String, username: String },
    #[serde(rename_all = "camelCase")]
    JoinServer { server_code: String, user_id: String, username: String },
    #[serde(rename_all = "camelCase")]
    UpdateUser { server_code: String, user_id: String, username: String },
    #[serde(rename_all = "camelCase")]
    LeaveServer { server_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    KickUser { server_code: String, user_id: String, target_id: String },
    #[serde(rename_all = "camelCase")]
    GetUsers { server_code: String },
    #[serde(rename_all = "camelCase")]
    Heartbeat { server_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    StartTimer { server_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    StopTimer { server_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    RequestSong { server_code: String, user_id: String, song: SongCandidate },
    #[serde(rename_all = "camelCase")]
    GetRequests { server_code: String },
    #[serde(rename_all = "camelCase")]
    VoteSong {
        server_code: String,
        user_id:     String,
        song_id:     String,
        #[serde(default)]
        direction:   VoteDirection,
    },
    #[serde(rename_all = "camelCase")]
    ResolveVote { server_code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    GetQueue { server_code: String },
    #[serde(rename_all = "camelCase")]
    SetQueue { server_code: String, user_id: String, queue: Vec<Value> },
    #[serde(rename_all = "camelCase")]
    EndSession { server_code: String, user_id: String },
}

impl ClientEvent {
    pub fn parse(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(bad)
    }
}

/* ---------------- server → client ---------------- */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ServerCreated { server_code: String },
    UpdateUsers(Roster),
    UserJoined { user: UserView },
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },
    UserList(Roster),
    #[serde(rename_all = "camelCase")]
    KickedUser { user_id: String },
    #[serde(rename_all = "camelCase")]
    HostLeft { server_code: String },
    #[serde(rename_all = "camelCase")]
    HostTimedOut { server_code: String },
    #[serde(rename_all = "camelCase")]
    UserTimedOut { user_id: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded { server_code: String },
    #[serde(rename_all = "camelCase")]
    ServerFull { server_code: String },
    JoinError { message: String },
    LeaveError { message: String },
    ActionError { kind: String, message: String },
    RequestedSongs { songs: Vec<SongCandidate> },
    VotesUpdate { votes: HashMap<String, u32> },
    /// `song == None` when nobody voted.
    VotedSong { song: Option<String> },
    QueueListUpdate { queue: Vec<Value> },
    #[serde(rename_all = "camelCase")]
    PhaseStarted { phase: Phase, duration_secs: u64 },
    #[serde(rename_all = "camelCase")]
    CountdownUpdate { phase: Phase, remaining_secs: u64 },
    TimerEnded { phase: Phase },
    #[serde(rename_all = "camelCase")]
    HeartbeatReceived { user_id: String },
}

impl ServerEvent {
    pub fn to_frame(&self) -> Option<String> {
        serde_json::to_string(self)
            .map_err(|e| tracing::warn!(error = %e, "unserialisable event"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_vote_with_default_direction() {
        let ev = ClientEvent::parse(
            r#"{"event":"voteSong","data":{"serverCode":"123456","userId":"u","songId":"s"}}"#,
        )
        .unwrap();
        match ev {
            ClientEvent::VoteSong { direction, song_id, .. } => {
                assert_eq!(direction, VoteDirection::Affirm);
                assert_eq!(song_id, "s");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_retract_and_song_request() {
        let ev = ClientEvent::parse(
            r#"{"event":"voteSong","data":{"serverCode":"1","userId":"u","songId":"s","direction":"retract"}}"#,
        )
        .unwrap();
        assert!(matches!(ev, ClientEvent::VoteSong { direction: VoteDirection::Retract, .. }));

        let ev = ClientEvent::parse(
            r#"{"event":"requestSong","data":{"serverCode":"1","userId":"u","song":{"uri":"x","artist":"y"}}}"#,
        )
        .unwrap();
        assert!(matches!(ev, ClientEvent::RequestSong { ref song, .. } if song.uri == "x"));
    }

    #[test]
    fn rejects_unknown_event() {
        assert!(ClientEvent::parse(r#"{"event":"dance","data":{}}"#).is_err());
        assert!(ClientEvent::parse("not json").is_err());
    }

    #[test]
    fn server_events_are_tagged_camel_case() {
        let v: Value = serde_json::from_str(
            &ServerEvent::PhaseStarted { phase: Phase::Vote, duration_secs: 30 }.to_frame().unwrap(),
        )
        .unwrap();
        assert_eq!(v, json!({"event":"phaseStarted","data":{"phase":"vote","durationSecs":30}}));

        let v: Value =
            serde_json::from_str(&ServerEvent::VotedSong { song: None }.to_frame().unwrap()).unwrap();
        assert_eq!(v, json!({"event":"votedSong","data":{"song":null}}));
    }
}
