use std::collections::HashMap;
use rand::{seq::SliceRandom, Rng};
use serde_json::Value;
use tracing::{debug, info};

use super::Coordinator;
use crate::{
    error::{RoomErr, RoomResult},
    events::{ServerEvent, VoteDirection},
    state::{ConnId, Room, SongCandidate},
};

/// Highest count wins; ties are broken uniformly at random.
pub fn pick_winner<R: Rng>(votes: &HashMap<String, u32>, rng: &mut R) -> Option<String> {
    let top = *votes.values().max()?;
    let mut tied: Vec<&String> = votes.iter()
        .filter(|(_, n)| **n == top)
        .map(|(id, _)| id)
        .collect();
    tied.sort();
    tied.choose(rng).map(|id| (*id).clone())
}

/// `Retract` never lowers an existing count; it only makes the entry exist.
pub fn apply_vote(votes: &mut HashMap<String, u32>, song_id: &str, direction: VoteDirection) {
    let n = votes.entry(song_id.to_owned()).or_insert(0);
    if direction == VoteDirection::Affirm {
        *n += 1;
    }
}

fn participant(room: &Room, user_id: &str) -> RoomResult<()> {
    if room.knows(user_id) { Ok(()) } else { Err(RoomErr::UnknownMember(user_id.into())) }
}

impl Coordinator {
    pub async fn submit_request(&self, code: &str, user_id: &str, song: SongCandidate) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        participant(room, user_id)?;
        if !song.is_valid() {
            return Err(RoomErr::InvalidCandidate);
        }

        debug!(room = code, user = user_id, uri = %song.uri, "song requested");
        room.submitted.insert(song.uri.clone());
        room.song_requests.push(song);
        self.gateway.broadcast(code, &ServerEvent::RequestedSongs { songs: room.song_requests.clone() });
        Ok(())
    }

    pub async fn get_requests(&self, conn: ConnId, code: &str) -> RoomResult<()> {
        let reg = self.lock().await;
        let room = reg.get(code)?;
        self.gateway.reply(conn, &ServerEvent::RequestedSongs { songs: room.song_requests.clone() });
        Ok(())
    }

    /// Only ids that were requested in this room at some point are accepted.
    pub async fn cast_vote(&self, code: &str, user_id: &str, song_id: &str, direction: VoteDirection) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        participant(room, user_id)?;
        if !room.submitted.contains(song_id) {
            return Err(RoomErr::InvalidCandidate);
        }

        apply_vote(&mut room.votes, song_id, direction);
        self.gateway.broadcast(code, &ServerEvent::VotesUpdate { votes: room.votes.clone() });
        Ok(())
    }

    /// Host-only. The tally is cleared whether or not anyone voted.
    pub async fn resolve_vote(&self, code: &str, user_id: &str) -> RoomResult<Option<String>> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if !room.is_host(user_id) {
            return Err(RoomErr::NotAuthorized);
        }

        let winner = pick_winner(&room.votes, &mut rand::thread_rng());
        room.votes.clear();
        self.gateway.broadcast(code, &ServerEvent::VotedSong { song: winner.clone() });
        info!(room = code, winner = ?winner, "vote resolved");
        Ok(winner)
    }

    pub async fn get_queue(&self, conn: ConnId, code: &str) -> RoomResult<()> {
        let reg = self.lock().await;
        let room = reg.get(code)?;
        self.gateway.reply(conn, &ServerEvent::QueueListUpdate { queue: room.queue.clone() });
        Ok(())
    }

    /// Host-only; stored and echoed verbatim.
    pub async fn set_queue(&self, code: &str, user_id: &str, queue: Vec<Value>) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if !room.is_host(user_id) {
            return Err(RoomErr::NotAuthorized);
        }
        room.queue = queue;
        self.gateway.broadcast(code, &ServerEvent::QueueListUpdate { queue: room.queue.clone() });
        Ok(())
    }
}
