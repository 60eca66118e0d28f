//! Action codec: packs a composed move into the single integer the engine
//! understands, and unpacks it again.
//!
//! The action space is `(origin x destination) x modification` where the
//! modification is either "none" or "place a tile of kind k on cell t":
//!
//! ```text
//! move_index = origin * CELL_COUNT + destination
//! mod_index  = 0                                  (no tile)
//!            | 1 + kind_slot * CELL_COUNT + target (tile placed)
//! action     = move_index * MODIFICATION_STRIDE + mod_index
//! ```

use crate::board::{CellIndex, SurfaceKind, CELL_COUNT, PLACEABLE_KIND_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of distinct modification choices per move (none + 2 kinds x 25 cells)
pub const MODIFICATION_STRIDE: u32 = 1 + (PLACEABLE_KIND_COUNT * CELL_COUNT) as u32;

/// One past the largest valid action id
pub const ACTION_SPACE: u32 = (CELL_COUNT * CELL_COUNT) as u32 * MODIFICATION_STRIDE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Action id {0} is outside the action space")]
    OutOfRange(u32),

    #[error("{0} tiles cannot be placed")]
    NotPlaceable(SurfaceKind),
}

/// Integer identifier of one fully composed move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Optional tile placement that accompanies a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modification {
    /// Black or Gray
    pub kind: SurfaceKind,
    /// Cell whose surface changes
    pub cell: CellIndex,
}

/// A move in structured form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComposedMove {
    pub origin: CellIndex,
    pub destination: CellIndex,
    pub modification: Option<Modification>,
}

impl ComposedMove {
    pub fn new(origin: CellIndex, destination: CellIndex, modification: Option<Modification>) -> Self {
        Self {
            origin,
            destination,
            modification,
        }
    }

    pub fn encode(&self) -> Result<ActionId, CodecError> {
        encode(self.origin, self.destination, self.modification)
    }
}

impl fmt::Display for ComposedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.origin, self.destination)?;
        if let Some(m) = self.modification {
            write!(f, " +{}@{}", m.kind, m.cell)?;
        }
        Ok(())
    }
}

/// Encode a move. Fails only if the modification names the base surface.
pub fn encode(
    origin: CellIndex,
    destination: CellIndex,
    modification: Option<Modification>,
) -> Result<ActionId, CodecError> {
    let move_index = (origin.index() * CELL_COUNT + destination.index()) as u32;
    let mod_index = match modification {
        None => 0,
        Some(Modification { kind, cell }) => {
            let slot = kind.resource_slot().ok_or(CodecError::NotPlaceable(kind))?;
            1 + (slot * CELL_COUNT + cell.index()) as u32
        }
    };
    Ok(ActionId(move_index * MODIFICATION_STRIDE + mod_index))
}

pub fn decode(action: ActionId) -> Result<ComposedMove, CodecError> {
    if action.0 >= ACTION_SPACE {
        return Err(CodecError::OutOfRange(action.0));
    }

    let move_index = (action.0 / MODIFICATION_STRIDE) as usize;
    let mod_index = (action.0 % MODIFICATION_STRIDE) as usize;
    let out_of_range = || CodecError::OutOfRange(action.0);

    let origin = CellIndex::new(move_index / CELL_COUNT).ok_or_else(out_of_range)?;
    let destination = CellIndex::new(move_index % CELL_COUNT).ok_or_else(out_of_range)?;

    let modification = if mod_index == 0 {
        None
    } else {
        let offset = mod_index - 1;
        let kind = SurfaceKind::from_resource_slot(offset / CELL_COUNT).ok_or_else(out_of_range)?;
        let cell = CellIndex::new(offset % CELL_COUNT).ok_or_else(out_of_range)?;
        Some(Modification { kind, cell })
    };

    Ok(ComposedMove {
        origin,
        destination,
        modification,
    })
}
