//! Board model shared by the server's authoritative copy and the client's
//! mirror: an 8x8 grid of plates plus a fixed pool of dice.

use std::fmt;
use std::str::FromStr;

use crate::plates;

pub const BOARD_ROWS: usize = 8;
pub const BOARD_COLUMNS: usize = 8;
pub const DEFAULT_DICE: usize = 6;
/// Largest dice pool a board accepts, one die per cell.
pub const MAX_DICE: usize = BOARD_ROWS * BOARD_COLUMNS;

/// A board cell address such as `A1` (row letter, column digit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    row: u8,
    column: u8,
}

impl Location {
    /// Zero-based row and column.
    pub fn new(row: usize, column: usize) -> Option<Self> {
        if row < BOARD_ROWS && column < BOARD_COLUMNS {
            Some(Self {
                row: row as u8,
                column: column as u8,
            })
        } else {
            None
        }
    }

    pub fn row(&self) -> usize {
        self.row as usize
    }

    pub fn column(&self) -> usize {
        self.column as usize
    }

    /// Every location in row-major order (`A1`, `A2`, ..., `H8`).
    pub fn all() -> impl Iterator<Item = Location> {
        (0..BOARD_ROWS)
            .flat_map(|row| (0..BOARD_COLUMNS).filter_map(move |col| Location::new(row, col)))
    }

    fn index(&self) -> usize {
        self.row() * BOARD_COLUMNS + self.column()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, (b'1' + self.column) as char)
    }
}

impl FromStr for Location {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [row @ b'A'..=b'H', col @ b'1'..=b'8'] => {
                Location::new((row - b'A') as usize, (col - b'1') as usize).ok_or(())
            }
            _ => Err(()),
        }
    }
}

/// Die transparency colors. On the wire `0` means "no color".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum Color {
    Red = 1,
    Orange = 2,
    Yellow = 3,
    Green = 4,
    Blue = 5,
    Violet = 6,
}

impl Color {
    pub const NONE: u32 = 0;
    pub const MAX: u32 = Color::Violet as u32;

    /// Scan order used when a color has to be picked automatically.
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Violet,
    ];

    pub fn from_u32(value: u32) -> Option<Color> {
        Color::ALL.into_iter().find(|c| *c as u32 == value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Violet => "violet",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Color::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .or_else(|| s.parse::<u32>().ok().and_then(Color::from_u32))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plate {
    pub name: String,
    pub abbrev: String,
    pub description: String,
    /// Empty plates cannot hold dice.
    pub empty: bool,
}

impl Plate {
    pub fn new(name: &str, abbrev: &str) -> Self {
        Self {
            name: name.to_string(),
            abbrev: abbrev.to_string(),
            description: String::new(),
            empty: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }
}

/// A slot in the dice pool. Available while `location` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Die {
    pub owner: String,
    pub location: Option<Location>,
    pub color: Option<Color>,
}

impl Die {
    pub fn is_placed(&self) -> bool {
        self.location.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    plates: Vec<Plate>,
    dice: Vec<Die>,
}

impl Board {
    /// Board loaded with the default plate content.
    pub fn new(dice: usize) -> Self {
        Self {
            plates: plates::default_plates(),
            dice: vec![Die::default(); dice],
        }
    }

    /// Board with every plate empty, filled in later by a sync stream.
    pub fn blank(dice: usize) -> Self {
        Self {
            plates: vec![Plate::empty(); BOARD_ROWS * BOARD_COLUMNS],
            dice: vec![Die::default(); dice],
        }
    }

    pub fn plate(&self, location: Location) -> &Plate {
        &self.plates[location.index()]
    }

    pub fn set_plate(&mut self, location: Location, plate: Plate) {
        self.plates[location.index()] = plate;
    }

    /// Plates paired with their locations, in row-major order.
    pub fn plates(&self) -> impl Iterator<Item = (Location, &Plate)> {
        Location::all().zip(self.plates.iter())
    }

    pub fn dice(&self) -> &[Die] {
        &self.dice
    }

    pub fn die(&self, index: usize) -> Option<&Die> {
        self.dice.get(index)
    }

    /// Placed dice with their pool index, in index order.
    pub fn placed_dice(&self) -> impl Iterator<Item = (usize, &Die)> {
        self.dice.iter().enumerate().filter(|(_, d)| d.is_placed())
    }

    /// Records a die at `index`, growing the pool if a mirror learns of a
    /// larger one than it was built with. Indexes at or past [`MAX_DICE`]
    /// are refused and leave the pool untouched.
    pub fn set_die(&mut self, index: usize, die: Die) -> bool {
        if index >= MAX_DICE {
            return false;
        }
        if index >= self.dice.len() {
            self.dice.resize(index + 1, Die::default());
        }
        self.dice[index] = die;
        true
    }

    pub fn color_in_use(&self, color: Color) -> bool {
        self.placed_dice().any(|(_, d)| d.color == Some(color))
    }

    /// Lowest-index die that has not been placed yet.
    pub fn free_die(&self) -> Option<usize> {
        self.dice.iter().position(|d| !d.is_placed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse_and_display() {
        let loc: Location = "C7".parse().unwrap();
        assert_eq!(loc.row(), 2);
        assert_eq!(loc.column(), 6);
        assert_eq!(loc.to_string(), "C7");

        assert!("I1".parse::<Location>().is_err());
        assert!("A9".parse::<Location>().is_err());
        assert!("a1".parse::<Location>().is_err());
        assert!("A10".parse::<Location>().is_err());
        assert!("".parse::<Location>().is_err());
    }

    #[test]
    fn test_location_scan_is_row_major() {
        let all: Vec<Location> = Location::all().collect();
        assert_eq!(all.len(), BOARD_ROWS * BOARD_COLUMNS);
        assert_eq!(all[0].to_string(), "A1");
        assert_eq!(all[1].to_string(), "A2");
        assert_eq!(all[8].to_string(), "B1");
        assert_eq!(all[63].to_string(), "H8");
    }

    #[test]
    fn test_color_conversion() {
        assert_eq!(Color::from_u32(1), Some(Color::Red));
        assert_eq!(Color::from_u32(6), Some(Color::Violet));
        assert_eq!(Color::from_u32(Color::NONE), None);
        assert_eq!(Color::from_u32(7), None);
        assert_eq!("Blue".parse::<Color>(), Ok(Color::Blue));
        assert_eq!("3".parse::<Color>(), Ok(Color::Yellow));
        assert!("mauve".parse::<Color>().is_err());
    }

    #[test]
    fn test_default_board_layout() {
        let board = Board::new(DEFAULT_DICE);
        let a1 = board.plate("A1".parse().unwrap());
        assert_eq!(a1.name, "Ambivalence");
        assert_eq!(a1.abbrev, "Amb");
        assert!(!a1.empty);
        assert!(board.plate("H8".parse().unwrap()).empty);
        assert_eq!(board.dice().len(), DEFAULT_DICE);
        assert_eq!(board.placed_dice().count(), 0);
    }

    #[test]
    fn test_die_pool_tracking() {
        let mut board = Board::new(2);
        assert_eq!(board.free_die(), Some(0));

        board.set_die(
            0,
            Die {
                owner: "alice".to_string(),
                location: "A1".parse().ok(),
                color: Some(Color::Green),
            },
        );

        assert!(board.color_in_use(Color::Green));
        assert!(!board.color_in_use(Color::Red));
        assert_eq!(board.free_die(), Some(1));
        assert_eq!(board.placed_dice().count(), 1);
    }

    #[test]
    fn test_mirror_grows_dice_pool() {
        let mut board = Board::blank(0);
        assert!(board.set_die(3, Die::default()));
        assert_eq!(board.dice().len(), 4);
    }

    #[test]
    fn test_pool_growth_is_capped() {
        let mut board = Board::blank(DEFAULT_DICE);
        assert!(!board.set_die(MAX_DICE, Die::default()));
        assert!(!board.set_die(u32::MAX as usize, Die::default()));
        assert_eq!(board.dice().len(), DEFAULT_DICE);

        assert!(board.set_die(MAX_DICE - 1, Die::default()));
        assert_eq!(board.dice().len(), MAX_DICE);
    }
}
