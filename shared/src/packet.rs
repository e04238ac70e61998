//! Packet catalog and bit-exact marshaling.
//!
//! Every packet is a 4-byte big-endian event type followed by a payload
//! whose layout, and therefore length, is fixed by that event type. Text
//! fields are fixed-width, NUL-terminated and zero-padded; integers are in
//! network byte order. There is no length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::board::{Color, Location};
use crate::error::{ProtocolError, Result};

pub const HEADER_LENGTH: usize = 4;

pub const NICK_LENGTH: usize = 32;
pub const MAGIC_LENGTH: usize = 4;
pub const VERSION_LENGTH: usize = 16;
pub const SOFTWARE_LENGTH: usize = 32;
pub const REASON_LENGTH: usize = 64;
pub const MESSAGE_LENGTH: usize = 256;
pub const MOTD_LENGTH: usize = 256;
pub const PLATE_NAME_LENGTH: usize = 64;
pub const PLATE_ABBREV_LENGTH: usize = 4;
pub const PLATE_DESCRIPTION_LENGTH: usize = 256;
pub const LOCATION_LENGTH: usize = 3;

pub const PROTOVER_MAGIC: &str = "GLS";
pub const PLATE_FLAG_EMPTY: u32 = 0x1;

const PROTOVER_LENGTH: usize = MAGIC_LENGTH + VERSION_LENGTH + SOFTWARE_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    Protover = 0x01,
    ProtoverAck = 0x02,
    NickReq = 0x03,
    NickSet = 0x04,
    NickChange = 0x05,
    PlayerJoin = 0x06,
    PlayerPart = 0x07,
    Shutdown = 0x08,
    Say = 0x09,
    SayBroadcast = 0x0A,
    PlatePlace = 0x0B,
    DiePlace = 0x0C,
    DiePlaced = 0x0D,
    DieRejected = 0x0E,
    SyncEnd = 0x0F,
}

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::Protover,
        EventType::ProtoverAck,
        EventType::NickReq,
        EventType::NickSet,
        EventType::NickChange,
        EventType::PlayerJoin,
        EventType::PlayerPart,
        EventType::Shutdown,
        EventType::Say,
        EventType::SayBroadcast,
        EventType::PlatePlace,
        EventType::DiePlace,
        EventType::DiePlaced,
        EventType::DieRejected,
        EventType::SyncEnd,
    ];

    pub fn from_u32(value: u32) -> Option<EventType> {
        EventType::ALL.into_iter().find(|e| *e as u32 == value)
    }

    /// Static payload size, not counting the header.
    pub const fn payload_len(self) -> usize {
        match self {
            EventType::Protover => PROTOVER_LENGTH,
            EventType::ProtoverAck => 2 + REASON_LENGTH + PROTOVER_LENGTH,
            EventType::NickReq => NICK_LENGTH,
            EventType::NickSet => NICK_LENGTH + REASON_LENGTH,
            EventType::NickChange => 2 * NICK_LENGTH,
            EventType::PlayerJoin | EventType::PlayerPart => NICK_LENGTH,
            EventType::Shutdown => REASON_LENGTH,
            EventType::Say => MESSAGE_LENGTH,
            EventType::SayBroadcast => NICK_LENGTH + 8 + MESSAGE_LENGTH,
            EventType::PlatePlace => {
                LOCATION_LENGTH
                    + PLATE_NAME_LENGTH
                    + PLATE_ABBREV_LENGTH
                    + PLATE_DESCRIPTION_LENGTH
                    + 4
            }
            EventType::DiePlace => LOCATION_LENGTH + 4,
            EventType::DiePlaced => NICK_LENGTH + 4 + LOCATION_LENGTH + 4,
            EventType::DieRejected => LOCATION_LENGTH + 4 + REASON_LENGTH,
            EventType::SyncEnd => MOTD_LENGTH,
        }
    }

    pub const fn packet_len(self) -> usize {
        HEADER_LENGTH + self.payload_len()
    }
}

/// Length of the largest packet in the catalog. Channels and the framing
/// buffer are sized so one of these always moves as a unit.
pub const MAX_PACKET_LENGTH: usize = {
    let mut max = 0;
    let mut i = 0;
    while i < EventType::ALL.len() {
        let len = EventType::ALL[i].packet_len();
        if len > max {
            max = len;
        }
        i += 1;
    }
    max
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protover {
    pub magic: String,
    pub version: String,
    pub software: String,
}

impl Protover {
    pub fn new(version: &str, software: &str) -> Self {
        Self {
            magic: PROTOVER_MAGIC.to_string(),
            version: version.to_string(),
            software: software.to_string(),
        }
    }
}

/// A decoded or to-be-encoded packet. Fields hold the raw wire values;
/// [`Packet::validate`] checks them against their domain rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Protover(Protover),
    ProtoverAck {
        accepted: bool,
        reason: String,
        protover: Protover,
    },
    NickReq {
        nick: String,
    },
    /// An empty `nick` is a rejection and `reason` says why.
    NickSet {
        nick: String,
        reason: String,
    },
    NickChange {
        old: String,
        new: String,
    },
    PlayerJoin {
        nick: String,
    },
    PlayerPart {
        nick: String,
    },
    Shutdown {
        reason: String,
    },
    Say {
        message: String,
    },
    SayBroadcast {
        nick: String,
        timestamp: u64,
        message: String,
    },
    PlatePlace {
        location: String,
        name: String,
        abbrev: String,
        description: String,
        flags: u32,
    },
    DiePlace {
        location: String,
        color: u32,
    },
    DiePlaced {
        nick: String,
        die: u32,
        location: String,
        color: u32,
    },
    DieRejected {
        location: String,
        color: u32,
        reason: String,
    },
    SyncEnd {
        motd: String,
    },
}

impl Packet {
    pub fn event(&self) -> EventType {
        match self {
            Packet::Protover(_) => EventType::Protover,
            Packet::ProtoverAck { .. } => EventType::ProtoverAck,
            Packet::NickReq { .. } => EventType::NickReq,
            Packet::NickSet { .. } => EventType::NickSet,
            Packet::NickChange { .. } => EventType::NickChange,
            Packet::PlayerJoin { .. } => EventType::PlayerJoin,
            Packet::PlayerPart { .. } => EventType::PlayerPart,
            Packet::Shutdown { .. } => EventType::Shutdown,
            Packet::Say { .. } => EventType::Say,
            Packet::SayBroadcast { .. } => EventType::SayBroadcast,
            Packet::PlatePlace { .. } => EventType::PlatePlace,
            Packet::DiePlace { .. } => EventType::DiePlace,
            Packet::DiePlaced { .. } => EventType::DiePlaced,
            Packet::DieRejected { .. } => EventType::DieRejected,
            Packet::SyncEnd { .. } => EventType::SyncEnd,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.event().packet_len()
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut dst);
        dst.freeze()
    }

    /// Appends header and payload to `dst`. Text longer than its field is
    /// truncated so the terminator always fits.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u32(self.event() as u32);
        self.encode_payload(dst);
    }

    pub(crate) fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            Packet::Protover(pver) => put_protover(dst, pver),
            Packet::ProtoverAck {
                accepted,
                reason,
                protover,
            } => {
                dst.put_u16(u16::from(*accepted));
                put_str(dst, reason, REASON_LENGTH);
                put_protover(dst, protover);
            }
            Packet::NickReq { nick }
            | Packet::PlayerJoin { nick }
            | Packet::PlayerPart { nick } => put_str(dst, nick, NICK_LENGTH),
            Packet::NickSet { nick, reason } => {
                put_str(dst, nick, NICK_LENGTH);
                put_str(dst, reason, REASON_LENGTH);
            }
            Packet::NickChange { old, new } => {
                put_str(dst, old, NICK_LENGTH);
                put_str(dst, new, NICK_LENGTH);
            }
            Packet::Shutdown { reason } => put_str(dst, reason, REASON_LENGTH),
            Packet::Say { message } => put_str(dst, message, MESSAGE_LENGTH),
            Packet::SayBroadcast {
                nick,
                timestamp,
                message,
            } => {
                put_str(dst, nick, NICK_LENGTH);
                dst.put_u64(*timestamp);
                put_str(dst, message, MESSAGE_LENGTH);
            }
            Packet::PlatePlace {
                location,
                name,
                abbrev,
                description,
                flags,
            } => {
                put_str(dst, location, LOCATION_LENGTH);
                put_str(dst, name, PLATE_NAME_LENGTH);
                put_str(dst, abbrev, PLATE_ABBREV_LENGTH);
                put_str(dst, description, PLATE_DESCRIPTION_LENGTH);
                dst.put_u32(*flags);
            }
            Packet::DiePlace { location, color } => {
                put_str(dst, location, LOCATION_LENGTH);
                dst.put_u32(*color);
            }
            Packet::DiePlaced {
                nick,
                die,
                location,
                color,
            } => {
                put_str(dst, nick, NICK_LENGTH);
                dst.put_u32(*die);
                put_str(dst, location, LOCATION_LENGTH);
                dst.put_u32(*color);
            }
            Packet::DieRejected {
                location,
                color,
                reason,
            } => {
                put_str(dst, location, LOCATION_LENGTH);
                dst.put_u32(*color);
                put_str(dst, reason, REASON_LENGTH);
            }
            Packet::SyncEnd { motd } => put_str(dst, motd, MOTD_LENGTH),
        }
    }

    /// Decodes one packet from the front of `bytes`. Trailing bytes beyond
    /// the packet are left alone.
    pub fn decode(bytes: &[u8], validate: bool) -> Result<Packet> {
        let mut src = bytes;
        if src.len() < HEADER_LENGTH {
            return Err(ProtocolError::ShortRead {
                expected: HEADER_LENGTH,
                actual: src.len(),
            });
        }
        let event = Self::decode_header(src.get_u32())?;
        if src.len() < event.payload_len() {
            return Err(ProtocolError::ShortRead {
                expected: event.packet_len(),
                actual: bytes.len(),
            });
        }
        let packet = Self::decode_payload(event, &mut src);
        if validate {
            packet.validate()?;
        }
        Ok(packet)
    }

    pub fn decode_header(raw: u32) -> Result<EventType> {
        EventType::from_u32(raw).ok_or(ProtocolError::UnknownEvent(raw))
    }

    /// Reads exactly `event.payload_len()` bytes from `src`. The caller
    /// guarantees they are there.
    pub fn decode_payload(event: EventType, src: &mut impl Buf) -> Packet {
        match event {
            EventType::Protover => Packet::Protover(get_protover(src)),
            EventType::ProtoverAck => Packet::ProtoverAck {
                accepted: src.get_u16() != 0,
                reason: get_str(src, REASON_LENGTH),
                protover: get_protover(src),
            },
            EventType::NickReq => Packet::NickReq {
                nick: get_str(src, NICK_LENGTH),
            },
            EventType::NickSet => Packet::NickSet {
                nick: get_str(src, NICK_LENGTH),
                reason: get_str(src, REASON_LENGTH),
            },
            EventType::NickChange => Packet::NickChange {
                old: get_str(src, NICK_LENGTH),
                new: get_str(src, NICK_LENGTH),
            },
            EventType::PlayerJoin => Packet::PlayerJoin {
                nick: get_str(src, NICK_LENGTH),
            },
            EventType::PlayerPart => Packet::PlayerPart {
                nick: get_str(src, NICK_LENGTH),
            },
            EventType::Shutdown => Packet::Shutdown {
                reason: get_str(src, REASON_LENGTH),
            },
            EventType::Say => Packet::Say {
                message: get_str(src, MESSAGE_LENGTH),
            },
            EventType::SayBroadcast => Packet::SayBroadcast {
                nick: get_str(src, NICK_LENGTH),
                timestamp: src.get_u64(),
                message: get_str(src, MESSAGE_LENGTH),
            },
            EventType::PlatePlace => Packet::PlatePlace {
                location: get_str(src, LOCATION_LENGTH),
                name: get_str(src, PLATE_NAME_LENGTH),
                abbrev: get_str(src, PLATE_ABBREV_LENGTH),
                description: get_str(src, PLATE_DESCRIPTION_LENGTH),
                flags: src.get_u32(),
            },
            EventType::DiePlace => Packet::DiePlace {
                location: get_str(src, LOCATION_LENGTH),
                color: src.get_u32(),
            },
            EventType::DiePlaced => Packet::DiePlaced {
                nick: get_str(src, NICK_LENGTH),
                die: src.get_u32(),
                location: get_str(src, LOCATION_LENGTH),
                color: src.get_u32(),
            },
            EventType::DieRejected => Packet::DieRejected {
                location: get_str(src, LOCATION_LENGTH),
                color: src.get_u32(),
                reason: get_str(src, REASON_LENGTH),
            },
            EventType::SyncEnd => Packet::SyncEnd {
                motd: get_str(src, MOTD_LENGTH),
            },
        }
    }

    /// Checks every field against its domain rule.
    pub fn validate(&self) -> Result<()> {
        match self {
            Packet::Protover(pver) => validate_protover(pver),
            Packet::ProtoverAck {
                reason, protover, ..
            } => {
                validate_text("reason", reason, REASON_LENGTH)?;
                validate_protover(protover)
            }
            Packet::NickReq { nick }
            | Packet::PlayerJoin { nick }
            | Packet::PlayerPart { nick } => validate_nick(nick),
            Packet::NickSet { nick, reason } => {
                if !nick.is_empty() {
                    validate_nick(nick)?;
                }
                validate_text("reason", reason, REASON_LENGTH)
            }
            Packet::NickChange { old, new } => {
                validate_nick(old)?;
                validate_nick(new)
            }
            Packet::Shutdown { reason } => validate_text("reason", reason, REASON_LENGTH),
            Packet::Say { message } => validate_message(message),
            Packet::SayBroadcast { nick, message, .. } => {
                validate_nick(nick)?;
                validate_message(message)
            }
            Packet::PlatePlace {
                location,
                name,
                abbrev,
                description,
                flags,
            } => {
                validate_location(location)?;
                validate_text("plate name", name, PLATE_NAME_LENGTH)?;
                validate_text("plate abbreviation", abbrev, PLATE_ABBREV_LENGTH)?;
                validate_text("plate description", description, PLATE_DESCRIPTION_LENGTH)?;
                if flags & !PLATE_FLAG_EMPTY != 0 {
                    return Err(ProtocolError::invalid("plate flags", "unknown flag set"));
                }
                Ok(())
            }
            Packet::DiePlace { location, color } => {
                validate_location(location)?;
                validate_color(*color, true)
            }
            Packet::DiePlaced {
                nick,
                location,
                color,
                ..
            } => {
                validate_nick(nick)?;
                validate_location(location)?;
                validate_color(*color, false)
            }
            Packet::DieRejected {
                location,
                color,
                reason,
            } => {
                if !location.is_empty() {
                    validate_location(location)?;
                }
                validate_color(*color, true)?;
                validate_text("reason", reason, REASON_LENGTH)
            }
            Packet::SyncEnd { motd } => validate_text("motd", motd, MOTD_LENGTH),
        }
    }
}

fn put_str(dst: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width - 1);
    dst.put_slice(&bytes[..len]);
    dst.put_bytes(0, width - len);
}

fn get_str(src: &mut impl Buf, width: usize) -> String {
    let mut field = vec![0u8; width];
    src.copy_to_slice(&mut field);
    // The last byte is always treated as the terminator.
    let end = field[..width - 1]
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(width - 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn put_protover(dst: &mut BytesMut, pver: &Protover) {
    put_str(dst, &pver.magic, MAGIC_LENGTH);
    put_str(dst, &pver.version, VERSION_LENGTH);
    put_str(dst, &pver.software, SOFTWARE_LENGTH);
}

fn get_protover(src: &mut impl Buf) -> Protover {
    Protover {
        magic: get_str(src, MAGIC_LENGTH),
        version: get_str(src, VERSION_LENGTH),
        software: get_str(src, SOFTWARE_LENGTH),
    }
}

pub fn validate_nick(nick: &str) -> Result<()> {
    if nick.is_empty() {
        return Err(ProtocolError::invalid("nick", "empty"));
    }
    if nick.len() >= NICK_LENGTH {
        return Err(ProtocolError::invalid("nick", "too long"));
    }
    if !nick.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ProtocolError::invalid("nick", "not alphanumeric"));
    }
    Ok(())
}

fn validate_protover(pver: &Protover) -> Result<()> {
    if pver.magic != PROTOVER_MAGIC {
        return Err(ProtocolError::invalid("magic", "not GLS"));
    }
    validate_version(&pver.version)?;
    validate_software(&pver.software)
}

pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() >= VERSION_LENGTH {
        return Err(ProtocolError::invalid("version", "bad length"));
    }
    if !version.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(ProtocolError::invalid("version", "not digits and dots"));
    }
    Ok(())
}

pub fn validate_software(software: &str) -> Result<()> {
    if software.len() >= SOFTWARE_LENGTH {
        return Err(ProtocolError::invalid("software", "too long"));
    }
    if !software
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(ProtocolError::invalid("software", "bad character"));
    }
    Ok(())
}

/// Printable, non-control text that fits its field. May be empty.
pub fn validate_text(field: &'static str, text: &str, width: usize) -> Result<()> {
    if text.len() >= width {
        return Err(ProtocolError::invalid(field, "too long"));
    }
    if !text.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(ProtocolError::invalid(field, "not printable"));
    }
    Ok(())
}

fn validate_message(message: &str) -> Result<()> {
    if message.is_empty() {
        return Err(ProtocolError::invalid("message", "empty"));
    }
    validate_text("message", message, MESSAGE_LENGTH)
}

fn validate_location(location: &str) -> Result<()> {
    location
        .parse::<Location>()
        .map(|_| ())
        .map_err(|_| ProtocolError::invalid("location", "not a board cell"))
}

fn validate_color(color: u32, allow_none: bool) -> Result<()> {
    if color == Color::NONE && allow_none {
        return Ok(());
    }
    if Color::from_u32(color).is_none() {
        return Err(ProtocolError::invalid("color", "out of range"));
    }
    Ok(())
}
