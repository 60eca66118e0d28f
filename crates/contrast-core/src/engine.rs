//! The engine contract and the bundled Contrast engine.
//!
//! An [`Engine`] is the authoritative owner of a game: it validates and
//! applies actions, keeps the reversal history and runs the AI. The session
//! layer drives it from a worker thread and only ever sees copies of its
//! state through [`Engine::snapshot`].

use crate::board::{BoardSnapshot, CellIndex, Player};
use crate::bot::{SearchOutcome, SearchParams, Searcher};
use crate::codec::ActionId;
use crate::game::{ContrastGame, GameError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by an engine. Their display strings reach the UI unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Failed to load Game Engine: {0}")]
    Load(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Nothing to undo")]
    NothingToReverse,

    #[error("No legal move available")]
    NoLegalMove,

    #[error("Engine fault: {0}")]
    Internal(String),
}

/// Data the engine needs at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupPayload {
    /// JSON file with search parameters; defaults are used when absent
    pub model_path: Option<PathBuf>,
    /// Fixed RNG seed for reproducible AI play
    pub seed: Option<u64>,
}

/// Command surface of the authoritative game engine.
///
/// Implementations are driven from a single worker thread, one call at a
/// time, so they need `Send` but not `Sync`.
pub trait Engine: Send + 'static {
    /// Load whatever the engine needs. Called again only after a failure.
    fn initialize(&mut self, payload: &StartupPayload) -> Result<(), EngineError>;

    fn is_initialized(&self) -> bool;

    /// Start a new game. `player` is the side the requester plays; engines
    /// may ignore it when the rules fix the opening side.
    fn reset(&mut self, player: Player) -> Result<(), EngineError>;

    fn apply_action(&mut self, action: ActionId) -> Result<(), EngineError>;

    /// Undo the most recent action
    fn reverse_last_action(&mut self) -> Result<(), EngineError>;

    /// Search, apply the chosen action and report it
    fn run_ai_search(&mut self, simulations: u32) -> Result<SearchOutcome, EngineError>;

    /// Destinations for the piece on `cell`; empty when nothing can move
    fn legal_destinations(&self, cell: CellIndex) -> Vec<CellIndex>;

    fn snapshot(&self) -> Result<BoardSnapshot, EngineError>;
}

struct Loaded {
    game: ContrastGame,
    history: Vec<ContrastGame>,
    searcher: Searcher,
}

/// The reference engine: Contrast rules, full-position undo history and the
/// rollout searcher.
#[derive(Default)]
pub struct ContrastEngine {
    loaded: Option<Loaded>,
}

impl ContrastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn loaded(&self) -> Result<&Loaded, EngineError> {
        self.loaded.as_ref().ok_or(EngineError::NotInitialized)
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded, EngineError> {
        self.loaded.as_mut().ok_or(EngineError::NotInitialized)
    }

    /// Number of actions that can currently be reversed
    pub fn history_len(&self) -> usize {
        self.loaded.as_ref().map_or(0, |l| l.history.len())
    }
}

fn load_params(payload: &StartupPayload) -> Result<SearchParams, EngineError> {
    let Some(path) = &payload.model_path else {
        return Ok(SearchParams::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|e| EngineError::Load(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| EngineError::Load(format!("invalid model file {}: {}", path.display(), e)))
}

impl Engine for ContrastEngine {
    fn initialize(&mut self, payload: &StartupPayload) -> Result<(), EngineError> {
        let params = load_params(payload)?;
        let searcher = match payload.seed {
            Some(seed) => Searcher::with_seed(params, seed),
            None => Searcher::new(params),
        };
        self.loaded = Some(Loaded {
            game: ContrastGame::new(),
            history: Vec::new(),
            searcher,
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.loaded.is_some()
    }

    fn reset(&mut self, _player: Player) -> Result<(), EngineError> {
        // Player One always opens
        let loaded = self.loaded_mut()?;
        loaded.game = ContrastGame::new();
        loaded.history.clear();
        Ok(())
    }

    fn apply_action(&mut self, action: ActionId) -> Result<(), EngineError> {
        let loaded = self.loaded_mut()?;
        let before = loaded.game.clone();
        loaded.game.apply_action(action)?;
        loaded.history.push(before);
        Ok(())
    }

    fn reverse_last_action(&mut self) -> Result<(), EngineError> {
        let loaded = self.loaded_mut()?;
        let previous = loaded.history.pop().ok_or(EngineError::NothingToReverse)?;
        loaded.game = previous;
        Ok(())
    }

    fn run_ai_search(&mut self, simulations: u32) -> Result<SearchOutcome, EngineError> {
        let loaded = self.loaded_mut()?;
        let outcome = loaded
            .searcher
            .search(&loaded.game, simulations)
            .ok_or(EngineError::NoLegalMove)?;
        let before = loaded.game.clone();
        loaded.game.apply_action(outcome.action)?;
        loaded.history.push(before);
        Ok(outcome)
    }

    fn legal_destinations(&self, cell: CellIndex) -> Vec<CellIndex> {
        self.loaded()
            .map(|l| l.game.legal_destinations(cell))
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Result<BoardSnapshot, EngineError> {
        Ok(self.loaded()?.game.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use std::io::Write;

    fn cell(name: &str) -> CellIndex {
        name.parse().unwrap()
    }

    fn ready_engine() -> ContrastEngine {
        let mut engine = ContrastEngine::new();
        engine
            .initialize(&StartupPayload {
                model_path: None,
                seed: Some(42),
            })
            .unwrap();
        engine
    }

    #[test]
    fn test_commands_before_initialize_fail() {
        let mut engine = ContrastEngine::new();
        assert!(!engine.is_initialized());
        assert_eq!(engine.snapshot(), Err(EngineError::NotInitialized));
        assert_eq!(engine.reverse_last_action(), Err(EngineError::NotInitialized));
        assert!(engine.legal_destinations(cell("b1")).is_empty());
    }

    #[test]
    fn test_apply_and_reverse() {
        let mut engine = ready_engine();
        let action = codec::encode(cell("b1"), cell("b2"), None).unwrap();

        engine.apply_action(action).unwrap();
        assert_eq!(engine.snapshot().unwrap().move_count, 1);
        assert_eq!(engine.history_len(), 1);

        engine.reverse_last_action().unwrap();
        assert_eq!(engine.snapshot().unwrap(), BoardSnapshot::initial());
        assert_eq!(engine.reverse_last_action(), Err(EngineError::NothingToReverse));
    }

    #[test]
    fn test_illegal_action_leaves_state() {
        let mut engine = ready_engine();
        let action = codec::encode(cell("b1"), cell("b4"), None).unwrap();

        let err = engine.apply_action(action).unwrap_err();
        assert_eq!(err.to_string(), "Illegal Move");
        assert_eq!(engine.snapshot().unwrap(), BoardSnapshot::initial());
        assert_eq!(engine.history_len(), 0);
    }

    #[test]
    fn test_ai_search_applies_its_move() {
        let mut engine = ready_engine();
        let outcome = engine.run_ai_search(8).unwrap();

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.move_count, 1);
        assert_eq!(snapshot.current_player, Player::Two);
        assert!((-1.0..=1.0).contains(&outcome.value));
        assert_eq!(engine.history_len(), 1);
    }

    #[test]
    fn test_reset_always_opens_with_player_one() {
        let mut engine = ready_engine();
        engine.run_ai_search(4).unwrap();
        engine.reset(Player::Two).unwrap();

        assert_eq!(engine.snapshot().unwrap(), BoardSnapshot::initial());
        assert_eq!(engine.history_len(), 0);
    }

    #[test]
    fn test_initialize_reads_model_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("contrast-model-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"exploration": 0.7, "rollout_limit": 30}}"#).unwrap();

        let mut engine = ContrastEngine::new();
        engine
            .initialize(&StartupPayload {
                model_path: Some(path.clone()),
                seed: Some(1),
            })
            .unwrap();
        assert!(engine.is_initialized());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_initialize_missing_model_is_a_load_error() {
        let mut engine = ContrastEngine::new();
        let err = engine
            .initialize(&StartupPayload {
                model_path: Some(PathBuf::from("/definitely/not/here/model.json")),
                seed: None,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Load(_)));
        assert!(err.to_string().starts_with("Failed to load Game Engine"));
        assert!(!engine.is_initialized());
    }
}
