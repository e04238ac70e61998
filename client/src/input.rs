//! Text command parsing for the interactive client

use shared::{Color, Location};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Board,
    Plate(Location),
    Nick(String),
    Say(String),
    /// A color of `None` lets the server pick one.
    Place(Location, Option<Color>),
    Players,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Command not recognized: '{0}'")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid location '{0}', expected A1 through H8")]
    Location(String),
    #[error("Unknown color '{0}'")]
    Color(String),
}

pub const HELP: &str = "\
board: Print the game board.
plate <RowColumn>: Print the specified plate.
place <RowColumn> [color]: Place a die, optionally of a given color.
nick <name>: Change your nickname.
say <message>: Talk to everyone.
players: List the other players.
help: Show this help menu.
quit: Exit the program.
?: Same as 'help'.
";

fn parse_location(text: &str) -> Result<Location, CommandError> {
    text.to_ascii_uppercase()
        .parse()
        .map_err(|()| CommandError::Location(text.to_string()))
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "board" => Ok(Command::Board),
        "players" => Ok(Command::Players),
        "help" | "?" => Ok(Command::Help),
        "quit" => Ok(Command::Quit),
        "plate" if rest.is_empty() => Err(CommandError::Usage("plate <RowColumn>")),
        "plate" => parse_location(rest).map(Command::Plate),
        "nick" if rest.is_empty() || rest.contains(char::is_whitespace) => {
            Err(CommandError::Usage("nick <name>"))
        }
        "nick" => Ok(Command::Nick(rest.to_string())),
        "say" if rest.is_empty() => Err(CommandError::Usage("say <message>")),
        "say" => Ok(Command::Say(rest.to_string())),
        "place" => {
            let mut args = rest.split_whitespace();
            match (args.next(), args.next(), args.next()) {
                (Some(location), color, None) => {
                    parse_location(location).and_then(|location| match color {
                        None => Ok(Command::Place(location, None)),
                        Some(text) => text
                            .parse::<Color>()
                            .map(|c| Command::Place(location, Some(c)))
                            .map_err(|()| CommandError::Color(text.to_string())),
                    })
                }
                _ => Err(CommandError::Usage("place <RowColumn> [color]")),
            }
        }
        other => Err(CommandError::Unknown(other.to_string())),
    };
    Some(command)
}
