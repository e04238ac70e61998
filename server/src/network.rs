//! Server core: accepts connections, runs the session state machines and
//! owns the board.
//!
//! The core is a single task. It never touches a socket after handing it
//! to a bridge; all traffic moves through each session's channels, and
//! everything it queues for a session is queued without waiting.

use crate::bridge::{self, Bridge, BridgeEvent};
use crate::config::{ConfigError, ServerConfig};
use crate::game::GameState;
use crate::session::{QueueError, Session, SessionManager, SessionState};
use log::{debug, error, info, warn};
use shared::{write_packet, Color, Location, Packet, ProtocolError, Protover};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{interval, timeout, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Main server coordinating sessions and the board
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    sessions: SessionManager,
    game: GameState,
    /// Signalled by bridges whenever they have something for the core.
    notify: Arc<Notify>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            sessions: SessionManager::new(config.max_players),
            game: GameState::new(config.dice),
            notify: Arc::new(Notify::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Main server loop. Returns once `shutdown` resolves and every
    /// session has been told and closed.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let notify = Arc::clone(&self.notify);
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr).await,
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                _ = notify.notified() => {},
                _ = poll.tick() => {},
                _ = &mut shutdown => break,
            }

            self.process_sessions();
            self.reap_sessions().await;
        }

        self.shutdown("Server shutting down").await;
        Ok(())
    }

    async fn accept(&mut self, mut stream: TcpStream, addr: SocketAddr) {
        if !self.sessions.has_free_slot() {
            warn!("No free slot for {}, turning it away", addr);
            let notice = Packet::Shutdown {
                reason: "Server full".to_string(),
            };
            // bounded so a peer that never reads cannot hold the core
            match timeout(self.config.read_timeout, write_packet(&mut stream, &notice)).await {
                Ok(Err(e)) => debug!("Could not notify {}: {}", addr, e),
                Err(_) => debug!("Timed out notifying {}", addr),
                Ok(Ok(())) => {}
            }
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let (core_end, bridge_end) =
            match bridge::duplex(self.config.send_queue, Arc::clone(&self.notify)) {
                Ok(ends) => ends,
                Err(e) => {
                    error!("Failed to set up session for {}: {}", addr, e);
                    return;
                }
            };
        let id = self.sessions.next_id();
        let handle = Bridge::new(id, addr, stream, bridge_end, self.config.read_timeout).spawn();
        if let Err(session) = self.sessions.insert(Session::new(id, addr, core_end, handle)) {
            error!("Session {} lost its slot", session.id);
        }
    }

    /// Handles everything the bridges have reported, session by session in
    /// slot order.
    fn process_sessions(&mut self) {
        for id in self.sessions.ids() {
            self.process_session(id);
        }
    }

    fn process_session(&mut self, id: u32) {
        let events = match self.sessions.get_mut(id) {
            Some(session) if !session.is_killed() => session.drain_events(),
            _ => return,
        };

        for event in events {
            if !self.is_live(id) {
                break;
            }
            match event {
                BridgeEvent::Packet(packet) => self.handle_packet(id, packet, Ok(())),
                BridgeEvent::Invalid { packet, error } => {
                    self.handle_packet(id, packet, Err(error))
                }
                BridgeEvent::Failed(ProtocolError::Closed) => {
                    info!("Session {} disconnected", id);
                    self.kill(id);
                }
                BridgeEvent::Failed(e) => {
                    warn!("Session {} failed: {}", id, e);
                    self.kill(id);
                }
            }
        }
    }

    /// Removes sessions whose bridge has exited, or whose bridge has been
    /// stuck flushing for longer than the drain timeout.
    async fn reap_sessions(&mut self) {
        let drain_timeout = self.config.drain_timeout;
        let finished: Vec<u32> = self
            .sessions
            .iter()
            .filter(|s| {
                s.bridge_finished() || s.killed_for().is_some_and(|t| t > drain_timeout)
            })
            .map(|s| s.id)
            .collect();

        for id in finished {
            // a bridge can report and exit after this round's processing
            self.process_session(id);
            let Some(mut session) = self.sessions.remove(id) else {
                continue;
            };
            session.kill();
            let part = session.part_notice();
            session.join(Duration::ZERO).await;
            info!("Session {} reaped", id);

            if let Some(part) = part {
                self.broadcast(part, None);
            }
        }
    }

    async fn shutdown(&mut self, reason: &str) {
        info!("Server shutting down, closing {} sessions", self.sessions.len());
        let notice = Packet::Shutdown {
            reason: reason.to_string(),
        };

        for id in self.sessions.ids() {
            if let Some(session) = self.sessions.get_mut(id) {
                if let Err(e) = session.send(notice.clone()) {
                    debug!("Session {} missed shutdown notice: {}", id, e);
                }
                session.kill();
            }
        }

        let deadline = Instant::now() + self.config.drain_timeout;
        for id in self.sessions.ids() {
            if let Some(session) = self.sessions.remove(id) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                session.join(remaining).await;
            }
        }
        info!("Server stopped");
    }

    fn is_live(&self, id: u32) -> bool {
        self.sessions.get(id).is_some_and(|s| !s.is_killed())
    }

    fn kill(&mut self, id: u32) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.kill();
        }
    }

    /// Queues a packet for one session. A session that cannot take it is
    /// killed; false in that case.
    fn send(&mut self, id: u32, packet: Packet) -> bool {
        let Some(session) = self.sessions.get(id) else {
            return false;
        };
        match session.send(packet) {
            Ok(()) => true,
            Err(QueueError::Killed) => false,
            Err(e) => {
                warn!("Session {} cannot take more packets ({}), killing", id, e);
                self.kill(id);
                false
            }
        }
    }

    /// Queues a packet for every active session except `exclude`.
    fn broadcast(&mut self, packet: Packet, exclude: Option<u32>) {
        for id in self.sessions.active_ids() {
            if Some(id) != exclude {
                self.send(id, packet.clone());
            }
        }
    }

    fn handle_packet(&mut self, id: u32, packet: Packet, validation: Result<(), ProtocolError>) {
        let Some(state) = self.sessions.get(id).map(Session::state) else {
            return;
        };
        match state {
            SessionState::Connecting => self.handle_protover(id, packet, validation),
            SessionState::ProtoverChecked => self.handle_first_nick(id, packet, validation),
            SessionState::Synchronized | SessionState::Active => {
                self.handle_active(id, packet, validation)
            }
            SessionState::Killed => {}
        }
    }

    fn handle_protover(&mut self, id: u32, packet: Packet, validation: Result<(), ProtocolError>) {
        let ours = Protover::new(&self.config.version, &self.config.software);
        let event = packet.event();
        let Packet::Protover(offer) = packet else {
            warn!("Session {} sent {:?} before its version offer", id, event);
            self.send(
                id,
                Packet::ProtoverAck {
                    accepted: false,
                    reason: "Expected protocol version".to_string(),
                    protover: ours,
                },
            );
            self.kill(id);
            return;
        };

        let rejection = match validation {
            Err(e) => Some(format!("Bad protover: {}", e)),
            Ok(()) if offer.version != self.config.version => Some(format!(
                "Version {} unsupported, need {}",
                offer.version, self.config.version
            )),
            Ok(()) => None,
        };

        match rejection {
            Some(reason) => {
                warn!("Session {} rejected: {}", id, reason);
                self.send(
                    id,
                    Packet::ProtoverAck {
                        accepted: false,
                        reason,
                        protover: ours,
                    },
                );
                self.kill(id);
            }
            None => {
                info!(
                    "Session {} speaks version {} ({})",
                    id, offer.version, offer.software
                );
                if self.send(
                    id,
                    Packet::ProtoverAck {
                        accepted: true,
                        reason: String::new(),
                        protover: ours,
                    },
                ) {
                    self.advance(id, SessionState::ProtoverChecked);
                }
            }
        }
    }

    fn handle_first_nick(
        &mut self,
        id: u32,
        packet: Packet,
        validation: Result<(), ProtocolError>,
    ) {
        let event = packet.event();
        let Packet::NickReq { nick } = packet else {
            warn!("Session {} sent {:?} instead of a nickname", id, event);
            self.reject_nick(id, "Expected nickname");
            self.kill(id);
            return;
        };

        if let Err(e) = validation {
            warn!("Session {} sent a bad nickname: {}", id, e);
            self.reject_nick(id, "Invalid nickname");
            self.kill(id);
            return;
        }

        if let Err(e) = self.sessions.check_nick(id, &nick) {
            info!("Session {} asked for taken nickname {}", id, nick);
            self.reject_nick(id, &e.to_string());
            return;
        }

        if let Some(session) = self.sessions.get_mut(id) {
            session.set_nick(nick.clone());
        }
        info!("Session {} is now {}", id, nick);
        if !self.send(
            id,
            Packet::NickSet {
                nick: nick.clone(),
                reason: String::new(),
            },
        ) {
            return;
        }
        self.broadcast(Packet::PlayerJoin { nick }, Some(id));
        self.synchronize(id);
    }

    /// Streams the board to a session that just got its nickname, then
    /// lets it play.
    fn synchronize(&mut self, id: u32) {
        self.advance(id, SessionState::Synchronized);
        for packet in self.game.sync_packets(&self.config.motd) {
            if !self.send(id, packet) {
                return;
            }
        }
        self.advance(id, SessionState::Active);
        debug!("Session {} synchronized", id);
    }

    fn handle_active(&mut self, id: u32, packet: Packet, validation: Result<(), ProtocolError>) {
        match packet {
            Packet::Say { message } => {
                if let Err(e) = validation {
                    warn!("Session {} sent unusable chat: {}", id, e);
                    return;
                }
                let Some(nick) = self.nick_of(id) else {
                    return;
                };
                debug!("<{}> {}", nick, message);
                self.broadcast(
                    Packet::SayBroadcast {
                        nick,
                        timestamp: unix_timestamp(),
                        message,
                    },
                    None,
                );
            }
            Packet::NickReq { nick } => self.handle_nick_change(id, nick, validation),
            Packet::DiePlace { location, color } => {
                self.handle_die_place(id, location, color, validation)
            }
            other => {
                warn!(
                    "Session {} sent unexpected {:?}, killing",
                    id,
                    other.event()
                );
                self.kill(id);
            }
        }
    }

    fn handle_nick_change(&mut self, id: u32, nick: String, validation: Result<(), ProtocolError>) {
        if let Err(e) = validation {
            info!("Session {} sent a bad nickname: {}", id, e);
            self.reject_nick(id, "Invalid nickname");
            return;
        }
        let Some(old) = self.nick_of(id) else {
            return;
        };
        if old == nick {
            self.send(
                id,
                Packet::NickSet {
                    nick,
                    reason: String::new(),
                },
            );
            return;
        }
        if let Err(e) = self.sessions.check_nick(id, &nick) {
            info!("{} asked for taken nickname {}", old, nick);
            self.reject_nick(id, &e.to_string());
            return;
        }

        if let Some(session) = self.sessions.get_mut(id) {
            session.set_nick(nick.clone());
        }
        info!("{} is now known as {}", old, nick);
        self.send(
            id,
            Packet::NickSet {
                nick: nick.clone(),
                reason: String::new(),
            },
        );
        self.broadcast(Packet::NickChange { old, new: nick }, Some(id));
    }

    fn handle_die_place(
        &mut self,
        id: u32,
        location: String,
        color: u32,
        validation: Result<(), ProtocolError>,
    ) {
        let parsed = location.parse::<Location>();
        let (target, requested) = match (validation, parsed) {
            (Ok(()), Ok(target)) => (target, Color::from_u32(color)),
            (validation, _) => {
                let reason = match validation {
                    Err(e) => e.to_string(),
                    Ok(()) => "invalid location".to_string(),
                };
                info!("Session {} sent a bad die placement: {}", id, reason);
                // echo only what would itself pass validation
                let location = if location.parse::<Location>().is_ok() {
                    location
                } else {
                    String::new()
                };
                let color = if color <= Color::MAX { color } else { Color::NONE };
                self.send(
                    id,
                    Packet::DieRejected {
                        location,
                        color,
                        reason,
                    },
                );
                return;
            }
        };

        let Some(nick) = self.nick_of(id) else {
            return;
        };
        match self.game.place_die(&nick, target, requested) {
            Ok(placed) => self.broadcast(
                Packet::DiePlaced {
                    nick,
                    die: placed.die as u32,
                    location: placed.location.to_string(),
                    color: placed.color as u32,
                },
                None,
            ),
            Err(e) => {
                info!("{} could not place a die at {}: {}", nick, target, e);
                self.send(
                    id,
                    Packet::DieRejected {
                        location,
                        color,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn reject_nick(&mut self, id: u32, reason: &str) {
        self.send(
            id,
            Packet::NickSet {
                nick: String::new(),
                reason: reason.to_string(),
            },
        );
    }

    fn advance(&mut self, id: u32, next: SessionState) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.advance(next);
        }
    }

    fn nick_of(&self, id: u32) -> Option<String> {
        self.sessions.get(id).and_then(Session::nick).map(str::to_string)
    }
}

/// Seconds since the Unix epoch, zero if the clock is before it.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}
