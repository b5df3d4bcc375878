use tracing::{debug, info};

use super::Coordinator;
use crate::{
    error::{RoomErr, RoomResult},
    events::ServerEvent,
    state::{ConnId, Participant, Room},
};

impl Coordinator {
    /// A userId already in the room counts as a reconnect and never grows the list.
    pub async fn join(&self, conn: ConnId, code: &str, user_id: &str, username: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if self.refresh(room, conn, user_id, username) {
            return Ok(());
        }
        if room.members.len() >= self.cfg.room_capacity {
            return Err(RoomErr::RoomFull(code.into()));
        }

        let member = Participant::new(user_id, username, Some(conn));
        let joined = ServerEvent::UserJoined { user: member.view() };
        room.members.push(member);

        self.gateway.subscribe(conn, code);
        self.gateway.broadcast(code, &ServerEvent::UpdateUsers(room.roster()));
        self.gateway.broadcast(code, &joined);
        info!(room = code, user = user_id, members = room.members.len(), "user joined");
        Ok(())
    }

    /// Unknown users are refused rather than silently joined.
    pub async fn reconnect(&self, conn: ConnId, code: &str, user_id: &str, username: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if self.refresh(room, conn, user_id, username) {
            Ok(())
        } else {
            Err(RoomErr::UnknownMember(user_id.into()))
        }
    }

    pub async fn leave(&self, code: &str, user_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if room.is_host(user_id) {
            self.teardown(&mut reg, code, ServerEvent::HostLeft { server_code: code.into() });
            return Ok(());
        }

        let gone = room.remove_member(user_id)
            .ok_or_else(|| RoomErr::UnknownMember(user_id.into()))?;
        self.gateway.broadcast(code, &ServerEvent::UpdateUsers(room.roster()));
        self.gateway.broadcast(code, &ServerEvent::UserLeft { user_id: user_id.into() });
        if let Some(c) = gone.conn {
            self.gateway.unsubscribe(c, code);
        }
        info!(room = code, user = user_id, "user left");
        Ok(())
    }

    pub async fn kick(&self, code: &str, kicker_id: &str, target_id: &str) -> RoomResult<()> {
        let mut reg = self.lock().await;
        let room = reg.get_mut(code)?;
        if !room.is_host(kicker_id) {
            return Err(RoomErr::NotAuthorized);
        }
        if room.is_host(target_id) {
            debug!(room = code, "host cannot kick themselves");
            return Ok(());
        }

        let gone = room.remove_member(target_id);
        self.gateway.broadcast(code, &ServerEvent::UpdateUsers(room.roster()));
        self.gateway.broadcast(code, &ServerEvent::KickedUser { user_id: target_id.into() });
        if let Some(c) = gone.and_then(|p| p.conn) {
            self.gateway.unsubscribe(c, code);
        }
        info!(room = code, user = target_id, "user kicked");
        Ok(())
    }

    /// Replied to the asking connection only.
    pub async fn list_members(&self, conn: ConnId, code: &str) -> RoomResult<()> {
        let reg = self.lock().await;
        let room = reg.get(code)?;
        self.gateway.reply(conn, &ServerEvent::UserList(room.roster()));
        Ok(())
    }

    /// Updates a known host/member in place and re-subscribes `conn`.
    fn refresh(&self, room: &mut Room, conn: ConnId, user_id: &str, username: &str) -> bool {
        let Some(p) = room.participant_mut(user_id) else { return false };
        p.username = username.into();
        p.touch();
        let old = p.conn.replace(conn);

        if let Some(old) = old.filter(|o| *o != conn) {
            self.gateway.unsubscribe(old, &room.code);
        }
        self.gateway.subscribe(conn, &room.code);
        self.gateway.broadcast(&room.code, &ServerEvent::UpdateUsers(room.roster()));
        debug!(room = %room.code, user = user_id, "user refreshed");
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        coordinator::test_support::*,
        error::RoomErr,
        events::ServerEvent,
    };

    #[tokio::test]
    async fn join_fills_to_capacity_then_refuses() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;

        for i in 2..=5 {
            c.join(conn(), &code, &format!("u{i}"), &format!("User{i}")).await.unwrap();
        }
        assert_eq!(c.join(conn(), &code, "u6", "User6").await, Err(RoomErr::RoomFull(code.clone())));
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(4));

        let joined = gw.room_events(&code).into_iter()
            .filter(|e| matches!(e, ServerEvent::UserJoined { .. }))
            .count();
        assert_eq!(joined, 4);
    }

    #[tokio::test]
    async fn join_missing_room() {
        let (c, _gw) = coordinator(quiet_config());
        assert_eq!(c.join(conn(), "000000", "u", "U").await,
                   Err(RoomErr::RoomNotFound("000000".into())));
    }

    #[tokio::test]
    async fn rejoin_does_not_duplicate() {
        let (c, _gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        c.join(conn(), &code, "a", "Ann").await.unwrap();
        c.join(conn(), &code, "a", "Annie").await.unwrap();
        c.join(conn(), &code, "h", "Host").await.unwrap();

        let names = c.inspect(&code, |r| r.roster().users.into_iter()
            .map(|u| u.username).collect::<Vec<_>>()).await.unwrap();
        assert_eq!(names, ["Annie"]);
    }

    #[tokio::test]
    async fn host_leave_tears_down_room() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        c.join(conn(), &code, "a", "Ann").await.unwrap();

        c.leave(&code, "h").await.unwrap();
        assert_eq!(c.room_count().await, 0);
        assert_eq!(gw.room_events(&code).last(),
                   Some(&ServerEvent::HostLeft { server_code: code.clone() }));

        gw.clear();
        assert!(c.join(conn(), &code, "b", "Bob").await.is_err());
        assert!(c.leave(&code, "a").await.is_err());
        assert!(gw.room_events(&code).is_empty());
    }

    #[tokio::test]
    async fn member_leave_updates_roster() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        let ann = conn();
        c.join(ann, &code, "a", "Ann").await.unwrap();
        c.join(conn(), &code, "b", "Bob").await.unwrap();

        c.leave(&code, "a").await.unwrap();
        let events = gw.room_events(&code);
        let n = events.len();
        match &events[n - 2] {
            ServerEvent::UpdateUsers(r) => assert_eq!(r.users.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[n - 1], ServerEvent::UserLeft { user_id: "a".into() });
        assert!(!gw.is_subscribed(ann, &code));
        assert_eq!(c.leave(&code, "a").await, Err(RoomErr::UnknownMember("a".into())));
    }

    #[tokio::test]
    async fn reconnect_updates_known_and_refuses_strangers() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        c.join(conn(), &code, "a", "Ann").await.unwrap();

        let fresh = conn();
        c.reconnect(fresh, &code, "h", "Boss").await.unwrap();
        assert_eq!(c.inspect(&code, |r| r.host.username.clone()).await.unwrap(), "Boss");
        assert!(gw.is_subscribed(fresh, &code));

        let ann2 = conn();
        c.reconnect(ann2, &code, "a", "Anna").await.unwrap();
        assert_eq!(c.inspect(&code, |r| r.members[0].conn).await.unwrap(), Some(ann2));

        assert_eq!(c.reconnect(conn(), &code, "zed", "Zed").await,
                   Err(RoomErr::UnknownMember("zed".into())));
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(1));
    }

    #[tokio::test]
    async fn kick_needs_host() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        let bob = conn();
        c.join(conn(), &code, "a", "Ann").await.unwrap();
        c.join(bob, &code, "b", "Bob").await.unwrap();

        assert_eq!(c.kick(&code, "a", "b").await, Err(RoomErr::NotAuthorized));
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(2));

        c.kick(&code, "h", "b").await.unwrap();
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(1));
        assert_eq!(gw.room_events(&code).last(),
                   Some(&ServerEvent::KickedUser { user_id: "b".into() }));
        assert!(!gw.is_subscribed(bob, &code));

        // absent target: still broadcast, nothing removed
        c.kick(&code, "h", "ghost").await.unwrap();
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(1));
    }

    #[tokio::test]
    async fn kicking_the_host_changes_nothing() {
        let (c, gw) = coordinator(quiet_config());
        let host = conn();
        let code = c.room_with_host(host).await;
        c.join(conn(), &code, "a", "Ann").await.unwrap();
        gw.clear();

        c.kick(&code, "h", "h").await.unwrap();
        assert!(gw.room_events(&code).is_empty());
        assert_eq!(c.room_count().await, 1);
        assert_eq!(c.inspect(&code, |r| r.members.len()).await, Some(1));
        assert!(gw.is_subscribed(host, &code));
    }

    #[tokio::test]
    async fn list_members_replies_only_to_caller() {
        let (c, gw) = coordinator(quiet_config());
        let code = c.room_with_host(conn()).await;
        gw.clear();

        let asker = conn();
        c.list_members(asker, &code).await.unwrap();
        assert!(matches!(gw.replies(asker).as_slice(), [ServerEvent::UserList(r)] if r.host.user_id == "h"));
        assert!(gw.room_events(&code).is_empty());
    }
}
