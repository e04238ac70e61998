//! # Glass Plate Game Protocol
//!
//! Types and marshaling shared by the server and the client.
//!
//! - [`packet`]: the packet catalog, its fixed binary layout and field
//!   validation.
//! - [`codec`]: whole-packet reads and writes over async streams, and a
//!   framing codec for cancel-safe reads.
//! - [`transport`]: guaranteed-full reads and writes that tolerate short
//!   transfers.
//! - [`board`]: the 8x8 plate grid and dice pool.
//!
//! ```rust
//! use shared::{Packet, Protover};
//!
//! let offer = Packet::Protover(Protover::new("0.0", "gls"));
//! let bytes = offer.encode();
//! assert_eq!(Packet::decode(&bytes, true).unwrap(), offer);
//! ```

pub mod board;
pub mod codec;
pub mod error;
pub mod packet;
pub mod plates;
pub mod transport;

pub use board::{
    Board, Color, Die, Location, Plate, BOARD_COLUMNS, BOARD_ROWS, DEFAULT_DICE, MAX_DICE,
};
pub use codec::{read_packet, write_packet, GlsCodec};
pub use error::{ErrorKind, ProtocolError};
pub use packet::{EventType, Packet, Protover, MAX_PACKET_LENGTH};

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: &str = "0.0";
pub const DEFAULT_PORT: u16 = 13500;

impl Packet {
    /// Sync packet describing the plate at `location`.
    pub fn plate(location: Location, plate: &Plate) -> Packet {
        Packet::PlatePlace {
            location: location.to_string(),
            name: plate.name.clone(),
            abbrev: plate.abbrev.clone(),
            description: plate.description.clone(),
            flags: if plate.empty {
                packet::PLATE_FLAG_EMPTY
            } else {
                0
            },
        }
    }

    /// Announcement of a placed die. `None` for a die still in the pool.
    pub fn die(index: usize, die: &Die) -> Option<Packet> {
        let location = die.location?;
        Some(Packet::DiePlaced {
            nick: die.owner.clone(),
            die: index as u32,
            location: location.to_string(),
            color: die.color.map_or(Color::NONE, |c| c as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_packet_flags() {
        let board = Board::new(DEFAULT_DICE);
        let h8: Location = "H8".parse().unwrap();
        match Packet::plate(h8, board.plate(h8)) {
            Packet::PlatePlace {
                location, flags, ..
            } => {
                assert_eq!(location, "H8");
                assert_eq!(flags, packet::PLATE_FLAG_EMPTY);
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_die_packet_only_for_placed_dice() {
        assert!(Packet::die(0, &Die::default()).is_none());

        let die = Die {
            owner: "alice".to_string(),
            location: "A2".parse().ok(),
            color: Some(Color::Orange),
        };
        let packet = Packet::die(4, &die).unwrap();
        assert_eq!(
            packet,
            Packet::DiePlaced {
                nick: "alice".to_string(),
                die: 4,
                location: "A2".to_string(),
                color: 2,
            }
        );
        assert!(packet.validate().is_ok());
    }
}
