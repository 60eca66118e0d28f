//! Board representation shared by the engine and the session layer.
//!
//! This module contains:
//! - Player identities and cell coordinates on the 5x5 grid
//! - Surface kinds (the tile colour under each cell)
//! - Per-player counts of the two placeable tile kinds
//! - The immutable `BoardSnapshot` handed across the engine boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width and height of the board
pub const BOARD_SIZE: usize = 5;

/// Total number of cells on the board
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Black tiles each player starts with
pub const INITIAL_BLACK_TILES: u8 = 3;

/// Gray tiles each player starts with
pub const INITIAL_GRAY_TILES: u8 = 1;

/// Number of tile kinds a player can place (Black and Gray)
pub const PLACEABLE_KIND_COUNT: usize = 2;

/// Errors raised when building board values from raw data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Invalid player number {0} (expected 1 or 2)")]
    InvalidPlayer(u8),

    #[error("Invalid surface kind {0} (expected 0, 1 or 2)")]
    InvalidSurface(u8),

    #[error("Cell index {0} is off the board")]
    InvalidCell(usize),

    #[error("Cannot parse cell '{0}'")]
    UnparsableCell(String),

    #[error("{player} has no {kind} tiles left")]
    ResourceExhausted { player: Player, kind: SurfaceKind },

    #[error("{0} is not a placeable tile kind")]
    NotPlaceable(SurfaceKind),
}

/// One of the two sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Player {
    /// Starts on the bottom row and races to the top
    One,
    /// Starts on the top row and races to the bottom
    Two,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::One, Player::Two];

    /// The other side
    pub fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Player number as shown to users (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    /// Zero-based index into per-player tables
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// Row this player must reach to win
    pub fn goal_row(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => BOARD_SIZE - 1,
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(BoardError::InvalidPlayer(other)),
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> u8 {
        player.number()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

/// Surface colour of a cell, which decides how a piece standing on it moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SurfaceKind {
    /// Base surface: orthogonal movement
    White,
    /// Diagonal movement
    Black,
    /// Movement in all eight directions
    Gray,
}

impl SurfaceKind {
    /// The two kinds players can place from their supply
    pub const PLACEABLE: [SurfaceKind; PLACEABLE_KIND_COUNT] = [SurfaceKind::Black, SurfaceKind::Gray];

    /// Slot of this kind in a player's supply (Black = 0, Gray = 1)
    pub fn resource_slot(self) -> Option<usize> {
        match self {
            SurfaceKind::White => None,
            SurfaceKind::Black => Some(0),
            SurfaceKind::Gray => Some(1),
        }
    }

    pub fn from_resource_slot(slot: usize) -> Option<SurfaceKind> {
        match slot {
            0 => Some(SurfaceKind::Black),
            1 => Some(SurfaceKind::Gray),
            _ => None,
        }
    }

    /// Whether this is the neutral surface new tiles may cover
    pub fn is_base(self) -> bool {
        self == SurfaceKind::White
    }

    /// Unit steps a piece on this surface may take
    pub fn directions(self) -> &'static [(i32, i32)] {
        const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
        const DIAGONAL: [(i32, i32); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];
        const ALL: [(i32, i32); 8] = [
            (0, -1),
            (0, 1),
            (-1, 0),
            (1, 0),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ];
        match self {
            SurfaceKind::White => &ORTHOGONAL,
            SurfaceKind::Black => &DIAGONAL,
            SurfaceKind::Gray => &ALL,
        }
    }
}

impl TryFrom<u8> for SurfaceKind {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SurfaceKind::White),
            1 => Ok(SurfaceKind::Black),
            2 => Ok(SurfaceKind::Gray),
            other => Err(BoardError::InvalidSurface(other)),
        }
    }
}

impl From<SurfaceKind> for u8 {
    fn from(kind: SurfaceKind) -> u8 {
        match kind {
            SurfaceKind::White => 0,
            SurfaceKind::Black => 1,
            SurfaceKind::Gray => 2,
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceKind::White => "white",
            SurfaceKind::Black => "black",
            SurfaceKind::Gray => "gray",
        };
        f.write_str(name)
    }
}

/// A validated cell on the board (`index = y * 5 + x`, row 0 at the top)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CellIndex(u8);

impl CellIndex {
    pub fn new(index: usize) -> Option<CellIndex> {
        (index < CELL_COUNT).then(|| CellIndex(index as u8))
    }

    pub fn from_xy(x: usize, y: usize) -> Option<CellIndex> {
        if x < BOARD_SIZE && y < BOARD_SIZE {
            Some(CellIndex((y * BOARD_SIZE + x) as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn x(self) -> usize {
        self.index() % BOARD_SIZE
    }

    pub fn y(self) -> usize {
        self.index() / BOARD_SIZE
    }

    /// Neighbouring cell one step away, if it is on the board
    pub fn offset(self, dx: i32, dy: i32) -> Option<CellIndex> {
        let x = self.x() as i32 + dx;
        let y = self.y() as i32 + dy;
        if (0..BOARD_SIZE as i32).contains(&x) && (0..BOARD_SIZE as i32).contains(&y) {
            CellIndex::from_xy(x as usize, y as usize)
        } else {
            None
        }
    }

    /// Every cell in index order
    pub fn all() -> impl Iterator<Item = CellIndex> {
        (0..CELL_COUNT as u8).map(CellIndex)
    }
}

impl TryFrom<u8> for CellIndex {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CellIndex::new(value as usize).ok_or(BoardError::InvalidCell(value as usize))
    }
}

impl From<CellIndex> for u8 {
    fn from(cell: CellIndex) -> u8 {
        cell.0
    }
}

/// Algebraic notation: files `a`-`e` left to right, ranks `5`-`1` top to bottom
impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.x() as u8) as char;
        let rank = BOARD_SIZE - self.y();
        write!(f, "{}{}", file, rank)
    }
}

/// Accepts either algebraic notation (`b2`) or a raw index (`21`)
impl FromStr for CellIndex {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if let Ok(index) = trimmed.parse::<usize>() {
            return CellIndex::new(index).ok_or(BoardError::InvalidCell(index));
        }

        let mut chars = trimmed.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(BoardError::UnparsableCell(s.to_string()));
        };
        let x = (file as u32).wrapping_sub('a' as u32) as usize;
        let rank = rank
            .to_digit(10)
            .ok_or_else(|| BoardError::UnparsableCell(s.to_string()))? as usize;
        if rank == 0 || rank > BOARD_SIZE {
            return Err(BoardError::UnparsableCell(s.to_string()));
        }
        CellIndex::from_xy(x, BOARD_SIZE - rank).ok_or_else(|| BoardError::UnparsableCell(s.to_string()))
    }
}

/// Remaining placeable tiles: `[P1 black, P1 gray, P2 black, P2 gray]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceCounts([u8; 4]);

impl ResourceCounts {
    pub fn new(counts: [u8; 4]) -> Self {
        Self(counts)
    }

    /// Starting supply for both players
    pub fn initial() -> Self {
        Self([
            INITIAL_BLACK_TILES,
            INITIAL_GRAY_TILES,
            INITIAL_BLACK_TILES,
            INITIAL_GRAY_TILES,
        ])
    }

    /// Tiles of `kind` the player still holds (always 0 for White)
    pub fn get(&self, player: Player, kind: SurfaceKind) -> u8 {
        kind.resource_slot()
            .map(|slot| self.0[player.index() * 2 + slot])
            .unwrap_or(0)
    }

    /// Whether the player holds at least one tile of either kind
    pub fn holds_any(&self, player: Player) -> bool {
        SurfaceKind::PLACEABLE
            .iter()
            .any(|&kind| self.get(player, kind) > 0)
    }

    /// Spend one tile of `kind` from the player's supply
    pub fn consume(&mut self, player: Player, kind: SurfaceKind) -> Result<(), BoardError> {
        let slot = kind.resource_slot().ok_or(BoardError::NotPlaceable(kind))?;
        let count = &mut self.0[player.index() * 2 + slot];
        *count = count
            .checked_sub(1)
            .ok_or(BoardError::ResourceExhausted { player, kind })?;
        Ok(())
    }

    pub fn as_array(&self) -> [u8; 4] {
        self.0
    }
}

impl Default for ResourceCounts {
    fn default() -> Self {
        Self::initial()
    }
}

/// Point-in-time copy of the engine's authoritative game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Occupant of each cell, `None` when empty
    pub pieces: [Option<Player>; CELL_COUNT],
    /// Surface kind of each cell
    pub tiles: [SurfaceKind; CELL_COUNT],
    /// Remaining placeable tiles per player
    pub tile_counts: ResourceCounts,
    /// Side to move
    pub current_player: Player,
    pub game_over: bool,
    /// Winner once the game is over, `None` for a draw or while in progress
    pub winner: Option<Player>,
    /// Number of actions applied since the last reset
    pub move_count: u32,
}

impl BoardSnapshot {
    /// The standard opening position
    pub fn initial() -> Self {
        let mut pieces = [None; CELL_COUNT];
        for x in 0..BOARD_SIZE {
            pieces[x] = Some(Player::Two);
            pieces[(BOARD_SIZE - 1) * BOARD_SIZE + x] = Some(Player::One);
        }

        Self {
            pieces,
            tiles: [SurfaceKind::White; CELL_COUNT],
            tile_counts: ResourceCounts::initial(),
            current_player: Player::One,
            game_over: false,
            winner: None,
            move_count: 0,
        }
    }

    pub fn occupant(&self, cell: CellIndex) -> Option<Player> {
        self.pieces[cell.index()]
    }

    pub fn surface(&self, cell: CellIndex) -> SurfaceKind {
        self.tiles[cell.index()]
    }

    pub fn is_occupied(&self, cell: CellIndex) -> bool {
        self.occupant(cell).is_some()
    }

    /// Tiles the side to move still holds of `kind`
    pub fn held_by_current(&self, kind: SurfaceKind) -> u8 {
        self.tile_counts.get(self.current_player, kind)
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_coordinates() {
        let cell = CellIndex::new(21).unwrap();
        assert_eq!(cell.x(), 1);
        assert_eq!(cell.y(), 4);
        assert_eq!(CellIndex::from_xy(1, 4), Some(cell));
        assert!(CellIndex::new(CELL_COUNT).is_none());
        assert!(CellIndex::from_xy(5, 0).is_none());
    }

    #[test]
    fn test_cell_notation() {
        assert_eq!(CellIndex::new(0).unwrap().to_string(), "a5");
        assert_eq!(CellIndex::new(24).unwrap().to_string(), "e1");
        assert_eq!("b1".parse::<CellIndex>().unwrap(), CellIndex::new(21).unwrap());
        assert_eq!("C3".parse::<CellIndex>().unwrap(), CellIndex::new(12).unwrap());
        assert_eq!("7".parse::<CellIndex>().unwrap(), CellIndex::new(7).unwrap());
        assert!("f1".parse::<CellIndex>().is_err());
        assert!("a6".parse::<CellIndex>().is_err());
        assert!("25".parse::<CellIndex>().is_err());
    }

    #[test]
    fn test_cell_offset_stays_on_board() {
        let corner = CellIndex::new(0).unwrap();
        assert!(corner.offset(-1, 0).is_none());
        assert!(corner.offset(0, -1).is_none());
        assert_eq!(corner.offset(1, 1), CellIndex::new(6));
    }

    #[test]
    fn test_resource_counts_consume() {
        let mut counts = ResourceCounts::initial();
        assert_eq!(counts.as_array(), [3, 1, 3, 1]);

        counts.consume(Player::Two, SurfaceKind::Gray).unwrap();
        assert_eq!(counts.get(Player::Two, SurfaceKind::Gray), 0);
        assert_eq!(
            counts.consume(Player::Two, SurfaceKind::Gray),
            Err(BoardError::ResourceExhausted {
                player: Player::Two,
                kind: SurfaceKind::Gray
            })
        );
        assert!(counts.consume(Player::One, SurfaceKind::White).is_err());
        assert_eq!(counts.as_array(), [3, 1, 3, 0]);
    }

    #[test]
    fn test_holds_any() {
        let counts = ResourceCounts::new([0, 0, 1, 0]);
        assert!(!counts.holds_any(Player::One));
        assert!(counts.holds_any(Player::Two));
    }

    #[test]
    fn test_initial_snapshot() {
        let snapshot = BoardSnapshot::initial();
        assert_eq!(snapshot.current_player, Player::One);
        assert_eq!(snapshot.move_count, 0);
        assert!(!snapshot.game_over);
        assert_eq!(snapshot.occupant(CellIndex::new(0).unwrap()), Some(Player::Two));
        assert_eq!(snapshot.occupant(CellIndex::new(22).unwrap()), Some(Player::One));
        assert!(!snapshot.is_occupied(CellIndex::new(12).unwrap()));
        assert!(snapshot.tiles.iter().all(|t| t.is_base()));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(BoardSnapshot::initial()).unwrap();
        assert_eq!(json["tile_counts"], serde_json::json!([3, 1, 3, 1]));
        assert_eq!(json["current_player"], serde_json::json!(1));
        assert_eq!(json["pieces"][0], serde_json::json!(2));
        assert_eq!(json["pieces"][12], serde_json::Value::Null);
        assert_eq!(json["tiles"].as_array().unwrap().len(), CELL_COUNT);

        let back: BoardSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, BoardSnapshot::initial());
    }
}
