//! Session orchestration for Contrast.
//!
//! The engine lives on its own worker thread. This crate owns the single
//! handle to it and keeps a local mirror of the game that a front end can
//! read at any time:
//! - [`channel`]: ordered commands out, ordered events and correlated query
//!   answers back
//! - [`store`]: session status, the latest snapshot, one command in flight
//! - [`composer`]: piece, destination and tile selection for the human move
//! - [`autoplay`]: hands the move to the AI on its turn
//! - [`config`]: environment-driven settings

pub mod autoplay;
pub mod channel;
pub mod composer;
pub mod config;
pub mod protocol;
pub mod store;
mod worker;

pub use autoplay::AutoplayTrigger;
pub use channel::{ChannelError, EngineChannel};
pub use composer::{is_placement_target, ComposerError, ComposerState, MoveComposer, PendingMove, Transition};
pub use config::{ConfigError, SessionConfig, Strength};
pub use protocol::{CommandKind, EngineEvent, EngineRequest, RequestId, WorkerReply};
pub use store::{SessionError, SessionStatus, SessionStore, SessionView};
