//! Messages exchanged with the engine worker.

use contrast_core::{ActionId, BoardSnapshot, CellIndex, Player, StartupPayload};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation id for query-style requests
pub type RequestId = Uuid;

/// Category of a command, used to name the failing command in faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Initialize,
    Reset,
    ApplyAction,
    ReverseLastAction,
    RunAiSearch,
    QueryLegalDestinations,
}

impl CommandKind {
    /// Whether the command mutates game state and answers with a broadcast event
    pub fn is_broadcast(self) -> bool {
        !matches!(self, CommandKind::QueryLegalDestinations)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Initialize => "initialize",
            CommandKind::Reset => "reset",
            CommandKind::ApplyAction => "apply action",
            CommandKind::ReverseLastAction => "reverse last action",
            CommandKind::RunAiSearch => "AI search",
            CommandKind::QueryLegalDestinations => "legal destination query",
        };
        f.write_str(name)
    }
}

/// Requests sent to the engine worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineRequest {
    /// Load the engine (no-op when already loaded)
    Initialize { payload: StartupPayload },

    /// Start a new game
    Reset { player: Player },

    /// Apply an encoded move
    ApplyAction { action: ActionId },

    /// Undo the most recent action
    ReverseLastAction,

    /// Search, play the chosen move, report it
    RunAiSearch { simulations: u32 },

    /// Look up where the piece on `cell` can go
    QueryLegalDestinations { id: RequestId, cell: CellIndex },

    /// Stop the worker after the current command
    Shutdown,
}

impl EngineRequest {
    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            EngineRequest::Initialize { .. } => Some(CommandKind::Initialize),
            EngineRequest::Reset { .. } => Some(CommandKind::Reset),
            EngineRequest::ApplyAction { .. } => Some(CommandKind::ApplyAction),
            EngineRequest::ReverseLastAction => Some(CommandKind::ReverseLastAction),
            EngineRequest::RunAiSearch { .. } => Some(CommandKind::RunAiSearch),
            EngineRequest::QueryLegalDestinations { .. } => Some(CommandKind::QueryLegalDestinations),
            EngineRequest::Shutdown => None,
        }
    }
}

/// Broadcast events delivered to the session store, in command order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// Full copy of the engine state after a command
    Snapshot { snapshot: BoardSnapshot },

    /// The AI's chosen action; always followed by a snapshot
    AiMove { action: ActionId, evaluation: f32 },

    /// A command failed; `reason` is shown to the user unchanged
    Fault { command: CommandKind, reason: String },
}

/// Everything the worker sends back, before routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WorkerReply {
    Event { event: EngineEvent },
    LegalDestinations { id: RequestId, cells: Vec<CellIndex> },
}
