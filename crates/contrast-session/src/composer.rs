//! Move composition: piece, destination, optional tile, commit.
//!
//! The composer only ever holds unsent local state. It reads the store's
//! snapshot for turn and supply checks and hands the finished action to
//! [`SessionStore::submit_move`].

use crate::store::{SessionError, SessionStore};
use contrast_core::{codec, ActionId, BoardSnapshot, CellIndex, CodecError, Modification, SurfaceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("It is not your turn")]
    NotYourTurn,

    #[error("The game is over")]
    GameOver,

    #[error("No {0} tiles left to place")]
    ResourceUnavailable(SurfaceKind),

    #[error("No move is waiting for a tile choice")]
    NoPendingMove,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Origin and destination chosen, tile not yet decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    pub origin: CellIndex,
    pub destination: CellIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComposerState {
    #[default]
    Idle,
    AwaitingDestination {
        origin: CellIndex,
        destinations: Vec<CellIndex>,
    },
    ChoosingModification {
        pending: PendingMove,
    },
    ModificationTargetPending {
        pending: PendingMove,
        kind: SurfaceKind,
    },
}

/// What a single input did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Selected {
        origin: CellIndex,
        destinations: Vec<CellIndex>,
    },
    Deselected,
    AwaitingModification(PendingMove),
    AwaitingTarget(SurfaceKind),
    Committed(ActionId),
    Cancelled,
    Ignored,
}

#[derive(Debug, Default)]
pub struct MoveComposer {
    state: ComposerState,
    /// Store epoch the partial move was started in
    epoch: u64,
}

impl MoveComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ComposerState::Idle
    }

    pub fn selected(&self) -> Option<CellIndex> {
        match &self.state {
            ComposerState::AwaitingDestination { origin, .. } => Some(*origin),
            ComposerState::ChoosingModification { pending }
            | ComposerState::ModificationTargetPending { pending, .. } => Some(pending.origin),
            ComposerState::Idle => None,
        }
    }

    pub fn pending_move(&self) -> Option<PendingMove> {
        match &self.state {
            ComposerState::ChoosingModification { pending }
            | ComposerState::ModificationTargetPending { pending, .. } => Some(*pending),
            _ => None,
        }
    }

    /// Cached legal destinations of the selected piece
    pub fn destinations(&self) -> &[CellIndex] {
        match &self.state {
            ComposerState::AwaitingDestination { destinations, .. } => destinations,
            _ => &[],
        }
    }

    /// Handle a click on a board cell.
    pub async fn select_cell(&mut self, store: &mut SessionStore, cell: CellIndex) -> Result<Transition, ComposerError> {
        let snapshot = self.guard(store)?;
        let mover = snapshot.current_player;

        match self.state.clone() {
            ComposerState::Idle => {
                if snapshot.occupant(cell) == Some(mover) {
                    self.select(store, cell).await
                } else {
                    Ok(Transition::Ignored)
                }
            }

            ComposerState::AwaitingDestination { origin, destinations } => {
                if cell == origin {
                    self.state = ComposerState::Idle;
                    Ok(Transition::Deselected)
                } else if destinations.contains(&cell) {
                    let pending = PendingMove {
                        origin,
                        destination: cell,
                    };
                    if snapshot.tile_counts.holds_any(mover) {
                        self.state = ComposerState::ChoosingModification { pending };
                        Ok(Transition::AwaitingModification(pending))
                    } else {
                        self.commit(store, pending, None)
                    }
                } else if snapshot.occupant(cell) == Some(mover) {
                    self.select(store, cell).await
                } else {
                    self.state = ComposerState::Idle;
                    Ok(Transition::Deselected)
                }
            }

            ComposerState::ChoosingModification { .. } => Ok(Transition::Ignored),

            ComposerState::ModificationTargetPending { pending, kind } => {
                if is_placement_target(&snapshot, pending, cell) {
                    self.commit(store, pending, Some(Modification { kind, cell }))
                } else {
                    Ok(Transition::Ignored)
                }
            }
        }
    }

    /// Pick which tile to place with the pending move.
    pub fn choose_modification(&mut self, store: &SessionStore, kind: SurfaceKind) -> Result<Transition, ComposerError> {
        let snapshot = self.guard(store)?;

        let pending = match &self.state {
            ComposerState::ChoosingModification { pending }
            | ComposerState::ModificationTargetPending { pending, .. } => *pending,
            _ => return Err(ComposerError::NoPendingMove),
        };

        if snapshot.held_by_current(kind) == 0 {
            return Err(ComposerError::ResourceUnavailable(kind));
        }

        self.state = ComposerState::ModificationTargetPending { pending, kind };
        Ok(Transition::AwaitingTarget(kind))
    }

    /// Commit the pending move without placing a tile.
    pub fn skip_modification(&mut self, store: &mut SessionStore) -> Result<Transition, ComposerError> {
        self.guard(store)?;
        match self.state {
            ComposerState::ChoosingModification { pending } => self.commit(store, pending, None),
            _ => Err(ComposerError::NoPendingMove),
        }
    }

    /// Discard a partial move started before the last reset, reversal or
    /// snapshot. Returns true when something was dropped.
    pub fn sync(&mut self, store: &SessionStore) -> bool {
        if self.is_idle() || store.epoch() == self.epoch {
            return false;
        }
        debug!("Position changed under a partial move, discarding it");
        self.state = ComposerState::Idle;
        true
    }

    /// Drop any partial move. Never contacts the engine.
    pub fn cancel(&mut self) -> Transition {
        if self.is_idle() {
            Transition::Ignored
        } else {
            self.state = ComposerState::Idle;
            Transition::Cancelled
        }
    }

    /// No input is accepted unless the human is to move in a live game. A
    /// partial move is discarded when that stops holding or the position has
    /// changed since it was started.
    fn guard(&mut self, store: &SessionStore) -> Result<BoardSnapshot, ComposerError> {
        self.sync(store);
        let result = match store.snapshot() {
            Some(snapshot) if snapshot.game_over => Err(ComposerError::GameOver),
            Some(snapshot) if store.is_human_turn() => Ok(snapshot.clone()),
            _ => Err(ComposerError::NotYourTurn),
        };
        if result.is_err() && !self.is_idle() {
            debug!("Discarding partial move");
            self.state = ComposerState::Idle;
        }
        result
    }

    async fn select(&mut self, store: &SessionStore, origin: CellIndex) -> Result<Transition, ComposerError> {
        let destinations = store.query_legal_destinations(origin).await?;
        debug!("Selected {} with {} destinations", origin, destinations.len());
        self.epoch = store.epoch();
        self.state = ComposerState::AwaitingDestination {
            origin,
            destinations: destinations.clone(),
        };
        Ok(Transition::Selected { origin, destinations })
    }

    /// Submit the move; on failure the composer keeps its state.
    fn commit(
        &mut self,
        store: &mut SessionStore,
        pending: PendingMove,
        modification: Option<Modification>,
    ) -> Result<Transition, ComposerError> {
        let action = codec::encode(pending.origin, pending.destination, modification)?;
        store.submit_move(action)?;
        self.state = ComposerState::Idle;
        Ok(Transition::Committed(action))
    }
}

/// Whether a tile may go on `cell` together with `pending`.
///
/// The cell must still show the base surface and be empty once the piece has
/// moved: the origin counts as vacated and the destination as occupied.
pub fn is_placement_target(snapshot: &BoardSnapshot, pending: PendingMove, cell: CellIndex) -> bool {
    if !snapshot.surface(cell).is_base() {
        return false;
    }
    let occupied = if cell == pending.origin {
        false
    } else if cell == pending.destination {
        true
    } else {
        snapshot.is_occupied(cell)
    };
    !occupied
}
