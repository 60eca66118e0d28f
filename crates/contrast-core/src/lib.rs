//! Contrast - a two-player race game on a 5x5 board of coloured tiles
//!
//! This crate provides the game logic the session layer talks to:
//! - Board model and the snapshot copied out of the engine
//! - The action codec that packs a move into a single integer
//! - Rules enforcement and win detection
//! - A rollout-based AI and the [`Engine`] contract
//!
//! # Architecture
//!
//! The engine is platform-agnostic. It can be compiled to:
//! - Native Rust, hosted on a worker thread by `contrast-session`
//! - WebAssembly for a browser worker (feature `wasm`)
//!
//! # Modules
//!
//! - [`board`]: Players, cells, surfaces, tile supply and snapshots
//! - [`codec`]: Action id encoding and decoding
//! - [`game`]: Rules state machine
//! - [`bot`]: Monte-Carlo search
//! - [`engine`]: Engine contract and the bundled implementation

pub mod board;
pub mod bot;
pub mod codec;
pub mod engine;
pub mod game;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use board::{
    BoardError, BoardSnapshot, CellIndex, Player, ResourceCounts, SurfaceKind, BOARD_SIZE, CELL_COUNT,
};
pub use bot::{SearchOutcome, SearchParams, Searcher};
pub use codec::{decode, encode, ActionId, CodecError, ComposedMove, Modification};
pub use engine::{ContrastEngine, Engine, EngineError, StartupPayload};
pub use game::{ContrastGame, GameError};
