use log::{debug, warn};
use shared::{Board, Color, Die, Location, Packet, Plate, DEFAULT_DICE, MAX_DICE};
use std::collections::BTreeSet;

/// Client-side mirror of the server's board, kept current from the sync
/// stream and the events that follow it.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub board: Board,
    /// Our own nickname once the server has assigned one.
    pub nick: Option<String>,
    /// Other players we have heard about since joining.
    pub players: BTreeSet<String>,
    pub motd: Option<String>,
    pub synced: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            board: Board::blank(DEFAULT_DICE),
            nick: None,
            players: BTreeSet::new(),
            motd: None,
            synced: false,
        }
    }

    /// Folds a server packet into the mirror. Packets that carry no board
    /// or roster state are ignored.
    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::NickSet { nick, .. } if !nick.is_empty() => {
                self.nick = Some(nick.clone());
            }
            Packet::NickChange { old, new } => {
                self.players.remove(old);
                self.players.insert(new.clone());
            }
            Packet::PlayerJoin { nick } => {
                self.players.insert(nick.clone());
            }
            Packet::PlayerPart { nick } => {
                self.players.remove(nick);
            }
            Packet::PlatePlace {
                location,
                name,
                abbrev,
                description,
                flags,
            } => match location.parse::<Location>() {
                Ok(location) => self.board.set_plate(
                    location,
                    Plate {
                        name: name.clone(),
                        abbrev: abbrev.clone(),
                        description: description.clone(),
                        empty: flags & shared::packet::PLATE_FLAG_EMPTY != 0,
                    },
                ),
                Err(()) => warn!("Plate for unknown location '{}'", location),
            },
            Packet::DiePlaced {
                nick,
                die,
                location,
                color,
            } => match location.parse::<Location>() {
                Ok(location) => {
                    let placed = self.board.set_die(
                        *die as usize,
                        Die {
                            owner: nick.clone(),
                            location: Some(location),
                            color: Color::from_u32(*color),
                        },
                    );
                    if placed {
                        debug!("Die {} now at {}", die, location);
                    } else {
                        warn!("Ignoring die {} past the pool limit of {}", die, MAX_DICE);
                    }
                }
                Err(()) => warn!("Die placed at unknown location '{}'", location),
            },
            Packet::SyncEnd { motd } => {
                self.motd = Some(motd.clone());
                self.synced = true;
            }
            _ => {}
        }
    }

    /// Dice currently sitting on `location`.
    pub fn dice_at(&self, location: Location) -> Vec<&Die> {
        self.board
            .placed_dice()
            .filter(|(_, die)| die.location == Some(location))
            .map(|(_, die)| die)
            .collect()
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
