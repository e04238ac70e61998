use crate::game::ClientGameState;
use shared::{Color, Location, Packet, BOARD_COLUMNS, BOARD_ROWS};
use std::fmt::Write;

const MARGIN: usize = 16;
const CELL_WIDTH: usize = 6;

fn border(out: &mut String) {
    out.push_str(&" ".repeat(MARGIN));
    for _ in 0..BOARD_COLUMNS {
        out.push('+');
        out.push_str(&"-".repeat(CELL_WIDTH - 1));
    }
    out.push_str("+\n");
}

/// The 8x8 grid of plate abbreviations. Empty plates show as `-`; a `*`
/// after the abbreviation marks a plate holding dice.
pub fn render_board(state: &ClientGameState) -> String {
    let mut out = String::new();

    out.push_str(&" ".repeat(MARGIN));
    for column in 1..=BOARD_COLUMNS {
        let _ = write!(out, "   {}  ", column);
    }
    out.push('\n');

    for row in 0..BOARD_ROWS {
        border(&mut out);
        out.push_str(&" ".repeat(MARGIN - 2));
        out.push((b'A' + row as u8) as char);
        out.push(' ');
        for location in (0..BOARD_COLUMNS).filter_map(|column| Location::new(row, column)) {
            let plate = state.board.plate(location);
            let label = if plate.empty {
                " - ".to_string()
            } else {
                format!("{:<3}", plate.abbrev.chars().take(3).collect::<String>())
            };
            let marker = if state.dice_at(location).is_empty() {
                ' '
            } else {
                '*'
            };
            let _ = write!(out, "| {}{}", label, marker);
        }
        out.push_str("|\n");
    }
    border(&mut out);
    out
}

/// Name, abbreviation, description and dice of one plate.
pub fn render_plate(state: &ClientGameState, location: Location) -> String {
    let plate = state.board.plate(location);
    if plate.empty {
        return format!("{}: (empty)\n", location);
    }

    let mut out = format!("{}: {} ({})\n", location, plate.name, plate.abbrev);
    if !plate.description.is_empty() {
        let _ = writeln!(out, "  {}", plate.description);
    }
    for die in state.dice_at(location) {
        let color = die.color.map_or("no color", |c| c.name());
        let _ = writeln!(out, "  die: {} ({})", die.owner, color);
    }
    out
}

/// One line for the player describing a server event, if it is worth
/// showing. Sync traffic is silent.
pub fn describe(packet: &Packet) -> Option<String> {
    match packet {
        Packet::NickSet { nick, reason } if nick.is_empty() => {
            Some(format!("Nickname rejected: {}", reason))
        }
        Packet::NickSet { nick, .. } => Some(format!("You are now known as {}", nick)),
        Packet::NickChange { old, new } => Some(format!("{} is now known as {}", old, new)),
        Packet::PlayerJoin { nick } => Some(format!("{} joined", nick)),
        Packet::PlayerPart { nick } => Some(format!("{} left", nick)),
        Packet::Shutdown { reason } => Some(format!("Server closed the connection: {}", reason)),
        Packet::SayBroadcast { nick, message, .. } => Some(format!("<{}> {}", nick, message)),
        Packet::DiePlaced {
            nick,
            location,
            color,
            ..
        } => Some(format!(
            "{} placed a {} die on {}",
            nick,
            Color::from_u32(*color).map_or("colorless", |c| c.name()),
            location
        )),
        Packet::DieRejected {
            location, reason, ..
        } if location.is_empty() => Some(format!("Die rejected: {}", reason)),
        Packet::DieRejected {
            location, reason, ..
        } => Some(format!("Die on {} rejected: {}", location, reason)),
        Packet::SyncEnd { motd } if !motd.is_empty() => Some(motd.clone()),
        _ => None,
    }
}
