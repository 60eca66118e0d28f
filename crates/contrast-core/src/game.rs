//! Core game state machine.
//!
//! `ContrastGame` enforces movement, tile placement and win detection. It
//! knows nothing about undo history or search; those live in the engine.

use crate::board::{BoardSnapshot, CellIndex, Player, ResourceCounts, SurfaceKind, CELL_COUNT};
use crate::codec::{self, ActionId, ComposedMove, Modification};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Repetition is only tracked once this many actions have been played
const REPETITION_MIN_MOVES: u32 = 50;

/// Times a position may recur before the game is drawn
const REPETITION_LIMIT: u32 = 5;

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Illegal Move")]
    IllegalMove,

    #[error("Game is over")]
    GameOver,

    #[error("Malformed action: {0}")]
    MalformedAction(String),
}

/// The complete rules state of one game
#[derive(Debug, Clone)]
pub struct ContrastGame {
    pieces: [Option<Player>; CELL_COUNT],
    tiles: [SurfaceKind; CELL_COUNT],
    tile_counts: ResourceCounts,
    current_player: Player,
    game_over: bool,
    winner: Option<Player>,
    move_count: u32,
    /// Position hash -> times seen
    position_history: HashMap<u64, u32>,
}

impl ContrastGame {
    /// A fresh game in the opening position with Player One to move
    pub fn new() -> Self {
        Self::from_snapshot(&BoardSnapshot::initial())
    }

    /// Rebuild a game from a snapshot. Repetition history starts empty.
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        Self {
            pieces: snapshot.pieces,
            tiles: snapshot.tiles,
            tile_counts: snapshot.tile_counts,
            current_player: snapshot.current_player,
            game_over: snapshot.game_over,
            winner: snapshot.winner,
            move_count: snapshot.move_count,
            position_history: HashMap::new(),
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            pieces: self.pieces,
            tiles: self.tiles,
            tile_counts: self.tile_counts,
            current_player: self.current_player,
            game_over: self.game_over,
            winner: self.winner,
            move_count: self.move_count,
        }
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn is_finished(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Cells the piece on `cell` may move to. Empty unless the piece belongs
    /// to the side to move.
    ///
    /// A piece steps in each direction its surface allows, hops over any run
    /// of friendly pieces and lands on the first empty cell. An enemy piece
    /// blocks the direction.
    pub fn legal_destinations(&self, cell: CellIndex) -> Vec<CellIndex> {
        let mut destinations = Vec::new();
        if self.pieces[cell.index()] != Some(self.current_player) {
            return destinations;
        }

        for &(dx, dy) in self.tiles[cell.index()].directions() {
            let mut cursor = cell.offset(dx, dy);
            while let Some(next) = cursor {
                match self.pieces[next.index()] {
                    None => {
                        destinations.push(next);
                        break;
                    }
                    Some(owner) if owner == self.current_player => {
                        cursor = next.offset(dx, dy);
                    }
                    Some(_) => break,
                }
            }
        }
        destinations
    }

    /// Every legal action for the side to move
    pub fn legal_actions(&self) -> Vec<ActionId> {
        if self.game_over {
            return Vec::new();
        }

        let player = self.current_player;
        let held: Vec<SurfaceKind> = SurfaceKind::PLACEABLE
            .into_iter()
            .filter(|&kind| self.tile_counts.get(player, kind) > 0)
            .collect();
        let base_cells: Vec<CellIndex> = CellIndex::all()
            .filter(|&c| self.tiles[c.index()].is_base())
            .collect();

        let mut actions = Vec::with_capacity(64);
        for origin in self.pieces_of(player) {
            for destination in self.legal_destinations(origin) {
                actions.push(encode_unchecked(origin, destination, None));

                for &target in &base_cells {
                    if !self.placement_allowed(origin, destination, target) {
                        continue;
                    }
                    for &kind in &held {
                        let modification = Modification { kind, cell: target };
                        actions.push(encode_unchecked(origin, destination, Some(modification)));
                    }
                }
            }
        }
        actions
    }

    /// Validate and apply an action for the side to move
    pub fn apply_action(&mut self, action: ActionId) -> Result<(), GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }

        let composed = codec::decode(action).map_err(|e| GameError::MalformedAction(e.to_string()))?;
        self.validate(&composed)?;
        self.play(&composed);
        Ok(())
    }

    /// Apply an action already known to be legal (used by search rollouts)
    pub(crate) fn apply_unchecked(&mut self, action: ActionId) {
        if self.game_over {
            return;
        }
        if let Ok(composed) = codec::decode(action) {
            self.play(&composed);
        }
    }

    fn validate(&self, composed: &ComposedMove) -> Result<(), GameError> {
        if !self.legal_destinations(composed.origin).contains(&composed.destination) {
            return Err(GameError::IllegalMove);
        }

        if let Some(Modification { kind, cell }) = composed.modification {
            if self.tile_counts.get(self.current_player, kind) == 0
                || !self.tiles[cell.index()].is_base()
                || !self.placement_allowed(composed.origin, composed.destination, cell)
            {
                return Err(GameError::IllegalMove);
            }
        }
        Ok(())
    }

    /// Whether a tile may go on `target` once the piece has moved
    fn placement_allowed(&self, origin: CellIndex, destination: CellIndex, target: CellIndex) -> bool {
        if target == destination {
            return false;
        }
        target == origin || self.pieces[target.index()].is_none()
    }

    fn play(&mut self, composed: &ComposedMove) {
        let mover = self.current_player;

        self.pieces[composed.destination.index()] = self.pieces[composed.origin.index()].take();

        if let Some(Modification { kind, cell }) = composed.modification {
            self.tiles[cell.index()] = kind;
            let spent = self.tile_counts.consume(mover, kind);
            debug_assert!(spent.is_ok(), "placed a {} tile {} does not hold", kind, mover);
        }

        self.check_goal_rows();
        self.current_player = mover.opponent();

        if !self.game_over && !self.has_any_move(self.current_player) {
            self.game_over = true;
            self.winner = Some(mover);
        }

        self.move_count += 1;

        if !self.game_over && self.move_count >= REPETITION_MIN_MOVES {
            let seen = self.position_history.entry(self.position_hash()).or_insert(0);
            *seen += 1;
            if *seen >= REPETITION_LIMIT {
                self.game_over = true;
                self.winner = None;
            }
        }
    }

    fn check_goal_rows(&mut self) {
        for player in Player::ALL {
            let reached = CellIndex::all()
                .filter(|c| c.y() == player.goal_row())
                .any(|c| self.pieces[c.index()] == Some(player));
            if reached {
                self.game_over = true;
                self.winner = Some(player);
                return;
            }
        }
    }

    fn has_any_move(&self, player: Player) -> bool {
        debug_assert_eq!(player, self.current_player);
        self.pieces_of(player)
            .any(|cell| !self.legal_destinations(cell).is_empty())
    }

    fn pieces_of(&self, player: Player) -> impl Iterator<Item = CellIndex> + '_ {
        CellIndex::all().filter(move |c| self.pieces[c.index()] == Some(player))
    }

    /// FNV-1a over pieces, surfaces and side to move
    fn position_hash(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        for i in 0..CELL_COUNT {
            hash ^= self.pieces[i].map_or(0, |p| p.number() as u64);
            hash = hash.wrapping_mul(PRIME);
            hash ^= u8::from(self.tiles[i]) as u64;
            hash = hash.wrapping_mul(PRIME);
        }
        hash ^= self.current_player.number() as u64;
        hash.wrapping_mul(PRIME)
    }
}

impl Default for ContrastGame {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_unchecked(origin: CellIndex, destination: CellIndex, modification: Option<Modification>) -> ActionId {
    // only Black/Gray reach here, which always encode
    codec::encode(origin, destination, modification).unwrap_or(ActionId(0))
}
