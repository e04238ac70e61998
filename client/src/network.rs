//! Client protocol driver: handshake, board sync and the interactive loop.

use crate::game::ClientGameState;
use crate::input::{parse_command, Command, HELP};
use crate::rendering::{describe, render_board, render_plate};
use log::{debug, error, info, warn};
use shared::packet::{self, MESSAGE_LENGTH};
use shared::{read_packet, write_packet, Color, EventType, Packet, ProtocolError, Protover};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("server refused protocol version: {0}")]
    VersionRejected(String),
    #[error("nickname rejected: {0}")]
    NickRejected(String),
    #[error("unexpected {0:?} from server")]
    Unexpected(EventType),
    #[error("server shut down: {0}")]
    Shutdown(String),
}

pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pub state: ClientGameState,
    /// Identity the server reported in its version ack.
    pub server: Option<Protover>,
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Client {
            reader,
            writer,
            state: ClientGameState::new(),
            server: None,
        })
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        debug!("-> {:?}", packet.event());
        write_packet(&mut self.writer, packet).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Packet, ClientError> {
        let packet = read_packet(&mut self.reader, true).await?;
        debug!("<- {:?}", packet.event());
        Ok(packet)
    }

    /// Offers our protocol version and waits for the verdict.
    pub async fn negotiate(&mut self, version: &str, software: &str) -> Result<(), ClientError> {
        self.send(&Packet::Protover(Protover::new(version, software)))
            .await?;

        match self.recv().await? {
            Packet::ProtoverAck {
                accepted: true,
                protover,
                ..
            } => {
                info!(
                    "Server speaks version {} ({})",
                    protover.version, protover.software
                );
                self.server = Some(protover);
                Ok(())
            }
            Packet::ProtoverAck { reason, .. } => Err(ClientError::VersionRejected(reason)),
            Packet::Shutdown { reason } => Err(ClientError::Shutdown(reason)),
            other => Err(ClientError::Unexpected(other.event())),
        }
    }

    /// Requests a nickname. On acceptance the board sync is read to its
    /// end; a rejection leaves the connection open for another try.
    pub async fn join(&mut self, nick: &str) -> Result<(), ClientError> {
        self.send(&Packet::NickReq {
            nick: nick.to_string(),
        })
        .await?;

        match self.recv().await? {
            Packet::NickSet { nick, reason } if nick.is_empty() => {
                Err(ClientError::NickRejected(reason))
            }
            packet @ Packet::NickSet { .. } => {
                self.state.apply(&packet);
                self.sync().await
            }
            Packet::Shutdown { reason } => Err(ClientError::Shutdown(reason)),
            other => Err(ClientError::Unexpected(other.event())),
        }
    }

    /// Applies sync packets until the end marker. Join and chat notices
    /// that interleave are applied too.
    async fn sync(&mut self) -> Result<(), ClientError> {
        loop {
            let packet = self.recv().await?;
            match &packet {
                Packet::Shutdown { reason } => return Err(ClientError::Shutdown(reason.clone())),
                Packet::ProtoverAck { .. } | Packet::NickSet { .. } => {
                    return Err(ClientError::Unexpected(packet.event()))
                }
                _ => {}
            }
            self.state.apply(&packet);
            if self.state.synced {
                info!("Board synchronized");
                return Ok(());
            }
        }
    }

    /// Carries out a command. Local commands return their output; the
    /// rest are sent to the server.
    pub async fn execute(&mut self, command: Command) -> Result<Option<String>, ClientError> {
        execute_command(&mut self.writer, &self.state, command).await
    }

    /// Interactive loop: commands from stdin, events from the server.
    /// Returns when the user quits, stdin ends or the server goes away.
    pub async fn run(self) -> Result<(), ClientError> {
        let Client {
            mut reader,
            mut writer,
            mut state,
            ..
        } = self;
        if let Some(motd) = &state.motd {
            println!("{}", motd);
        }

        let (packet_tx, mut packet_rx) = mpsc::channel::<Result<Packet, ProtocolError>>(64);
        let reader_task = tokio::spawn(async move {
            loop {
                let result = read_packet(&mut reader, true).await;
                let stop = result.is_err();
                if packet_tx.send(result).await.is_err() || stop {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let outcome = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => match parse_command(&line) {
                        None => {}
                        Some(Ok(Command::Quit)) => break Ok(()),
                        Some(Ok(command)) => {
                            match execute_command(&mut writer, &state, command).await {
                                Ok(Some(output)) => print!("{}", output),
                                Ok(None) => {}
                                Err(e) => break Err(e),
                            }
                        }
                        Some(Err(e)) => println!("{}", e),
                    },
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(ClientError::Io(e)),
                },

                incoming = packet_rx.recv() => match incoming {
                    Some(Ok(packet)) => {
                        state.apply(&packet);
                        if let Some(text) = describe(&packet) {
                            println!("{}", text);
                        }
                        if let Packet::Shutdown { reason } = packet {
                            warn!("Server shut down: {}", reason);
                            break Ok(());
                        }
                    }
                    Some(Err(ProtocolError::Closed)) | None => {
                        warn!("Server closed the connection");
                        break Ok(());
                    }
                    Some(Err(e)) => {
                        error!("Lost connection: {}", e);
                        break Err(ClientError::Protocol(e));
                    }
                },
            }
        };

        reader_task.abort();
        outcome
    }
}

async fn execute_command(
    writer: &mut OwnedWriteHalf,
    state: &ClientGameState,
    command: Command,
) -> Result<Option<String>, ClientError> {
    let packet = match command {
        Command::Board => return Ok(Some(render_board(state))),
        Command::Plate(location) => return Ok(Some(render_plate(state, location))),
        Command::Players => return Ok(Some(roster(state))),
        Command::Help => return Ok(Some(HELP.to_string())),
        Command::Quit => return Ok(None),
        Command::Nick(nick) => {
            if let Err(e) = packet::validate_nick(&nick) {
                return Ok(Some(format!("Bad nickname: {}\n", e)));
            }
            Packet::NickReq { nick }
        }
        Command::Say(message) => {
            if let Err(e) = packet::validate_text("message", &message, MESSAGE_LENGTH) {
                return Ok(Some(format!("Cannot send that: {}\n", e)));
            }
            Packet::Say { message }
        }
        Command::Place(location, color) => Packet::DiePlace {
            location: location.to_string(),
            color: color.map_or(Color::NONE, |c| c as u32),
        },
    };
    debug!("-> {:?}", packet.event());
    write_packet(writer, &packet).await?;
    Ok(None)
}

fn roster(state: &ClientGameState) -> String {
    let mut names: Vec<&str> = state.players.iter().map(String::as_str).collect();
    if let Some(nick) = state.nick.as_deref() {
        names.insert(0, nick);
    }
    format!("Players: {}\n", names.join(", "))
}
