use log::info;
use shared::{Board, Color, Die, Location, Packet};
use thiserror::Error;

/// Why a die placement was refused. The display text is the reason sent
/// back to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("No colors left")]
    NoColorsLeft,
    #[error("Color in use")]
    ColorInUse,
    #[error("No plate at location '{0}'")]
    EmptyPlate(Location),
    #[error("No dice left")]
    NoDiceLeft,
}

/// A die that has just been put on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub die: usize,
    pub location: Location,
    pub color: Color,
}

/// Authoritative board. Only the server core mutates it.
#[derive(Debug, Clone)]
pub struct GameState {
    board: Board,
}

impl GameState {
    pub fn new(dice: usize) -> Self {
        Self {
            board: Board::new(dice),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Lowest color no placed die is using.
    fn pick_color(&self) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|color| !self.board.color_in_use(*color))
    }

    /// Runs the placement checks in order: color, plate, free die.
    /// `requested` of `None` asks for an automatically picked color.
    pub fn check_placement(
        &self,
        location: Location,
        requested: Option<Color>,
    ) -> Result<(usize, Color), PlacementError> {
        let color = match requested {
            None => self.pick_color().ok_or(PlacementError::NoColorsLeft)?,
            Some(color) if self.board.color_in_use(color) => {
                return Err(PlacementError::ColorInUse)
            }
            Some(color) => color,
        };

        if self.board.plate(location).empty {
            return Err(PlacementError::EmptyPlate(location));
        }

        let die = self.board.free_die().ok_or(PlacementError::NoDiceLeft)?;
        Ok((die, color))
    }

    pub fn place_die(
        &mut self,
        owner: &str,
        location: Location,
        requested: Option<Color>,
    ) -> Result<Placement, PlacementError> {
        let (die, color) = self.check_placement(location, requested)?;
        self.board.set_die(
            die,
            Die {
                owner: owner.to_string(),
                location: Some(location),
                color: Some(color),
            },
        );
        info!("{} placed die {} ({}) at {}", owner, die, color, location);

        Ok(Placement {
            die,
            location,
            color,
        })
    }

    /// Full board snapshot for a newly joined player: every plate in
    /// row-major order, every placed die, then the end marker.
    pub fn sync_packets(&self, motd: &str) -> Vec<Packet> {
        let mut packets: Vec<Packet> = self
            .board
            .plates()
            .map(|(location, plate)| Packet::plate(location, plate))
            .collect();
        packets.extend(
            self.board
                .placed_dice()
                .filter_map(|(index, die)| Packet::die(index, die)),
        );
        packets.push(Packet::SyncEnd {
            motd: motd.to_string(),
        });
        packets
    }
}
