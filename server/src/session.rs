//! Session registry for connected players
//!
//! Every accepted connection becomes a [`Session`] held in a fixed number
//! of slots. The registry hands out session ids, keeps sessions in slot
//! order for deterministic processing, and arbitrates nicknames.
//!
//! A session moves strictly forward through its states:
//!
//! ```text
//! Connecting -> ProtoverChecked -> Synchronized -> Active
//!      \              \                 \            \
//!       +--------------+-----------------+------------+--> Killed
//! ```
//!
//! Killed sessions stay registered until their bridge task has exited,
//! then they are reaped and their slot is reused.

use crate::bridge::{BridgeEvent, CoreEnd};
use log::{debug, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Waiting for a protocol version offer.
    Connecting,
    /// Version accepted, waiting for an acceptable nickname.
    ProtoverChecked,
    /// Nickname accepted, board snapshot being queued.
    Synchronized,
    /// Playing.
    Active,
    /// Shut down; waiting for the bridge to exit.
    Killed,
}

/// Reasons a packet could not be queued for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("send queue full")]
    Full,
    #[error("bridge has exited")]
    Closed,
    #[error("session already killed")]
    Killed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NickError {
    #[error("Already in use")]
    InUse,
}

#[derive(Debug)]
pub struct Session {
    pub id: u32,
    pub addr: SocketAddr,
    nick: Option<String>,
    state: SessionState,
    /// Whether the session had reached `Active` before it was killed.
    was_active: bool,
    killed_at: Option<Instant>,
    events: tokio::sync::mpsc::Receiver<BridgeEvent>,
    /// Dropping this is what tells the bridge to flush and exit.
    outbound: Option<tokio::sync::mpsc::Sender<Packet>>,
    capacity: usize,
    bridge: JoinHandle<()>,
}

impl Session {
    pub fn new(id: u32, addr: SocketAddr, end: CoreEnd, bridge: JoinHandle<()>) -> Self {
        Self {
            id,
            addr,
            nick: None,
            state: SessionState::Connecting,
            was_active: false,
            killed_at: None,
            events: end.events,
            outbound: Some(end.outbound),
            capacity: end.capacity,
            bridge,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_killed(&self) -> bool {
        self.state == SessionState::Killed
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// Replaces the nickname, returning the previous one.
    pub fn set_nick(&mut self, nick: String) -> Option<String> {
        self.nick.replace(nick)
    }

    /// Moves to a later state. Going backwards or leaving `Killed` is a
    /// bug in the caller and is ignored.
    pub fn advance(&mut self, next: SessionState) {
        if self.state == SessionState::Killed || next <= self.state {
            warn!(
                "Session {} refused transition {:?} -> {:?}",
                self.id, self.state, next
            );
            return;
        }
        if next == SessionState::Killed {
            self.kill();
            return;
        }
        debug!("Session {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    /// Queues a packet without waiting.
    pub fn send(&self, packet: Packet) -> Result<(), QueueError> {
        let outbound = self.outbound.as_ref().ok_or(QueueError::Killed)?;
        outbound.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Stops the session. Packets already queued are still written.
    pub fn kill(&mut self) {
        if self.state == SessionState::Killed {
            return;
        }
        self.was_active = self.state == SessionState::Active;
        self.state = SessionState::Killed;
        self.killed_at = Some(Instant::now());
        self.outbound = None;
        info!("Session {} killed", self.id);
    }

    /// Takes whatever the bridge has reported so far, at most one channel's
    /// worth so a chatty peer cannot hold the core.
    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while events.len() < self.capacity {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    pub fn bridge_finished(&self) -> bool {
        self.bridge.is_finished()
    }

    /// How long ago the session was killed.
    pub fn killed_for(&self) -> Option<Duration> {
        self.killed_at.map(|at| at.elapsed())
    }

    /// Notice other players should get when this session is reaped.
    pub fn part_notice(&self) -> Option<Packet> {
        match (&self.nick, self.was_active) {
            (Some(nick), true) => Some(Packet::PlayerPart { nick: nick.clone() }),
            _ => None,
        }
    }

    /// Waits up to `limit` for the bridge to exit, aborting it after that.
    pub async fn join(mut self, limit: Duration) {
        if timeout(limit, &mut self.bridge).await.is_err() {
            warn!(
                "Session {} bridge still busy after {:?}, aborting",
                self.id, limit
            );
            self.bridge.abort();
        }
    }
}

/// Fixed set of session slots.
///
/// Iteration always follows slot order, which is also the order events
/// are processed in.
#[derive(Debug)]
pub struct SessionManager {
    slots: Vec<Option<Session>>,
    next_id: u32,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            slots: (0..max_sessions).map(|_| None).collect(),
            next_id: 1,
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Reserves an id for a session about to be created.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Puts a session into the lowest free slot. Hands it back when every
    /// slot is taken.
    pub fn insert(&mut self, session: Session) -> Result<(), Session> {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                info!("Session {} connected from {}", session.id, session.addr);
                *slot = Some(session);
                Ok(())
            }
            None => Err(session),
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<Session> {
        self.slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|s| s.id == id))
            .and_then(Option::take)
    }

    pub fn get(&self, id: u32) -> Option<&Session> {
        self.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Session> {
        self.slots.iter_mut().flatten().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().flatten()
    }

    /// Ids of all sessions, in slot order.
    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|s| s.id).collect()
    }

    /// Ids of sessions that receive broadcasts, in slot order.
    pub fn active_ids(&self) -> Vec<u32> {
        self.iter().filter(|s| s.is_active()).map(|s| s.id).collect()
    }

    /// Checks that `nick` is not held by any session other than `id`.
    /// Comparison is case-sensitive.
    pub fn check_nick(&self, id: u32, nick: &str) -> Result<(), NickError> {
        if self.iter().any(|s| s.id != id && s.nick() == Some(nick)) {
            return Err(NickError::InUse);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::duplex;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 13500)
    }

    /// A session without a socket. The returned receiver plays the bridge's
    /// outbound side.
    fn test_session(id: u32, capacity: usize) -> (Session, tokio::sync::mpsc::Receiver<Packet>) {
        let (core, end) = duplex(capacity, Arc::new(Notify::new())).unwrap();
        let (_, outbound) = end.into_parts();
        let handle = tokio::spawn(async {});
        (Session::new(id, test_addr(), core, handle), outbound)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (mut session, _rx) = test_session(1, 8);
        assert_eq!(session.state(), SessionState::Connecting);

        session.advance(SessionState::ProtoverChecked);
        session.advance(SessionState::Connecting);
        assert_eq!(session.state(), SessionState::ProtoverChecked);

        session.advance(SessionState::Synchronized);
        session.advance(SessionState::Active);
        assert!(session.is_active());

        session.kill();
        assert!(session.is_killed());
        session.advance(SessionState::Active);
        assert!(session.is_killed());
    }

    #[tokio::test]
    async fn test_send_after_kill_fails() {
        let (mut session, mut rx) = test_session(1, 8);
        let packet = Packet::PlayerJoin {
            nick: "alice".to_string(),
        };
        session.send(packet.clone()).unwrap();
        session.kill();

        assert_eq!(session.send(packet.clone()), Err(QueueError::Killed));
        assert_eq!(rx.recv().await, Some(packet));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_full_queue_reported() {
        let (session, _rx) = test_session(1, 1);
        let packet = Packet::Say {
            message: "x".to_string(),
        };
        session.send(packet.clone()).unwrap();
        assert_eq!(session.send(packet), Err(QueueError::Full));
    }

    #[tokio::test]
    async fn test_part_notice_only_for_active() {
        let (mut session, _rx) = test_session(1, 8);
        session.set_nick("alice".to_string());
        session.kill();
        assert!(session.part_notice().is_none());

        let (mut session, _rx) = test_session(2, 8);
        session.set_nick("bob".to_string());
        session.advance(SessionState::ProtoverChecked);
        session.advance(SessionState::Synchronized);
        session.advance(SessionState::Active);
        session.kill();
        assert_eq!(
            session.part_notice(),
            Some(Packet::PlayerPart {
                nick: "bob".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_manager_capacity_and_slot_reuse() {
        let mut manager = SessionManager::new(2);
        assert!(manager.is_empty());

        let a = manager.next_id();
        let b = manager.next_id();
        let c = manager.next_id();
        assert_eq!((a, b, c), (1, 2, 3));

        assert!(manager.insert(test_session(a, 4).0).is_ok());
        assert!(manager.insert(test_session(b, 4).0).is_ok());
        assert!(!manager.has_free_slot());
        assert!(manager.insert(test_session(c, 4).0).is_err());

        assert!(manager.remove(a).is_some());
        assert!(manager.remove(a).is_none());
        assert!(manager.insert(test_session(c, 4).0).is_ok());

        // c took a's old slot, ahead of b
        assert_eq!(manager.ids(), vec![c, b]);
    }

    #[tokio::test]
    async fn test_active_ids_filter() {
        let mut manager = SessionManager::new(4);
        let (mut active, _rx) = test_session(1, 4);
        active.advance(SessionState::Active);
        manager.insert(active).unwrap();
        manager.insert(test_session(2, 4).0).unwrap();

        assert_eq!(manager.active_ids(), vec![1]);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_nick_arbitration() {
        let mut manager = SessionManager::new(4);
        let (mut alice, _rx) = test_session(1, 4);
        alice.set_nick("Alice".to_string());
        manager.insert(alice).unwrap();
        manager.insert(test_session(2, 4).0).unwrap();

        assert_eq!(manager.check_nick(2, "Alice"), Err(NickError::InUse));
        assert_eq!(
            manager.check_nick(2, "Alice").unwrap_err().to_string(),
            "Already in use"
        );
        assert!(manager.check_nick(2, "alice").is_ok());
        assert!(manager.check_nick(1, "Alice").is_ok());
    }

    #[tokio::test]
    async fn test_drain_bounded_by_capacity() {
        let (core, end) = duplex(2, Arc::new(Notify::new())).unwrap();
        let (events, _outbound) = end.into_parts();
        let mut session = Session::new(1, test_addr(), core, tokio::spawn(async {}));

        let say = || {
            BridgeEvent::Packet(Packet::Say {
                message: "hi".to_string(),
            })
        };
        events.try_send(say()).unwrap();
        events.try_send(say()).unwrap();

        assert_eq!(session.drain_events().len(), 2);
        assert!(session.drain_events().is_empty());
    }

    #[tokio::test]
    async fn test_join_aborts_stuck_bridge() {
        let (core, _end) = duplex(2, Arc::new(Notify::new())).unwrap();
        let (guard, released) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        let session = Session::new(1, test_addr(), core, stuck);

        session.join(Duration::from_millis(10)).await;
        // the aborted task drops its end of the channel
        assert!(released.await.is_err());
    }
}
