//! Session store: the single owner of UI-visible session state.
//!
//! Every command goes out through the store and every engine event comes back
//! through [`SessionStore::apply_event`]. At most one broadcast command is in
//! flight; issuing another one while busy is rejected with
//! [`SessionError::Busy`].

use crate::autoplay::AutoplayTrigger;
use crate::channel::{ChannelError, EngineChannel};
use crate::config::SessionConfig;
use crate::protocol::{CommandKind, EngineEvent};
use contrast_core::{ActionId, BoardSnapshot, CellIndex, ContrastEngine, Engine, Player};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Uninitialized,
    Ready,
    Busy,
    Faulted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Ready => "ready",
            SessionStatus::Busy => "busy",
            SessionStatus::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Engine is still busy with {0}")]
    Busy(CommandKind),

    #[error("Session is {0}")]
    NotReady(SessionStatus),

    #[error("Simulation count must be positive")]
    InvalidSimulations,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Engine stopped unexpectedly")]
    EngineStopped,
}

/// The broadcast command currently awaiting its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Initialize,
    Reset,
    Move,
    Reversal { second: bool },
    AiSearch,
}

impl InFlight {
    fn kind(self) -> CommandKind {
        match self {
            InFlight::Initialize => CommandKind::Initialize,
            InFlight::Reset => CommandKind::Reset,
            InFlight::Move => CommandKind::ApplyAction,
            InFlight::Reversal { .. } => CommandKind::ReverseLastAction,
            InFlight::AiSearch => CommandKind::RunAiSearch,
        }
    }
}

/// Read-only copy of everything a front end renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub snapshot: Option<BoardSnapshot>,
    pub ai_value: f32,
    pub last_ai_action: Option<ActionId>,
    pub last_error: Option<String>,
    pub human_player: Option<Player>,
    pub simulations: u32,
}

pub struct SessionStore {
    channel: EngineChannel,
    config: SessionConfig,
    status: SessionStatus,
    in_flight: Option<InFlight>,
    snapshot: Option<BoardSnapshot>,
    ai_value: f32,
    last_ai_action: Option<ActionId>,
    last_error: Option<String>,
    autoplay: AutoplayTrigger,
    epoch: u64,
}

impl SessionStore {
    /// Store backed by the bundled engine. Must be called inside a tokio runtime.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_engine(ContrastEngine::new(), config)
    }

    pub fn with_engine<E: Engine>(engine: E, config: SessionConfig) -> Result<Self, SessionError> {
        if config.simulations == 0 {
            return Err(SessionError::InvalidSimulations);
        }
        let channel = EngineChannel::spawn(engine, config.query_timeout)?;
        Ok(Self {
            channel,
            config,
            status: SessionStatus::Uninitialized,
            in_flight: None,
            snapshot: None,
            ai_value: 0.0,
            last_ai_action: None,
            last_error: None,
            autoplay: AutoplayTrigger::new(),
            epoch: 0,
        })
    }

    // ---- commands ----

    /// Load the engine and wait for its first snapshot.
    ///
    /// Does nothing when the session is already ready or busy. A load failure
    /// leaves the session `Faulted` with the cause in [`Self::last_error`].
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if !matches!(self.status, SessionStatus::Uninitialized | SessionStatus::Faulted) {
            return Ok(());
        }

        info!("Initializing engine");
        self.channel.initialize(self.config.startup_payload())?;
        self.begin(InFlight::Initialize);

        while self.in_flight == Some(InFlight::Initialize) {
            self.next_event().await?;
        }
        Ok(())
    }

    /// Start a new game. `None` starts toward the configured human side.
    pub fn reset_game(&mut self, starting_player: Option<Player>) -> Result<(), SessionError> {
        if let Some(in_flight) = self.in_flight {
            return Err(SessionError::Busy(in_flight.kind()));
        }
        if self.status == SessionStatus::Uninitialized {
            return Err(SessionError::NotReady(self.status));
        }

        let player = starting_player
            .or(self.config.human_player)
            .unwrap_or(Player::One);
        info!("Resetting game for {}", player);

        self.channel.reset(player)?;
        self.ai_value = 0.0;
        self.last_ai_action = None;
        self.last_error = None;
        self.autoplay.rearm();
        self.epoch += 1;
        self.begin(InFlight::Reset);
        Ok(())
    }

    pub fn submit_move(&mut self, action: ActionId) -> Result<(), SessionError> {
        self.ensure_ready()?;
        info!("Submitting action {}", action);
        self.channel.apply_action(action)?;
        self.begin(InFlight::Move);
        Ok(())
    }

    /// Undo the last move. With a human side configured this continues
    /// undoing until it is the human's turn again.
    pub fn reverse_last_action(&mut self) -> Result<(), SessionError> {
        self.ensure_ready()?;
        info!("Reversing last action");
        self.channel.reverse_last_action()?;
        self.ai_value = 0.0;
        self.last_ai_action = None;
        self.epoch += 1;
        self.begin(InFlight::Reversal { second: false });
        Ok(())
    }

    /// Ask the AI to play the side to move, with `simulations` overriding the
    /// configured budget for this move only. No-op while busy or after the
    /// game has ended.
    pub fn request_ai_move(&mut self, simulations: Option<u32>) -> Result<(), SessionError> {
        let simulations = simulations.unwrap_or(self.config.simulations);
        if simulations == 0 {
            return Err(SessionError::InvalidSimulations);
        }
        if self.in_flight.is_some() {
            debug!("AI move requested while busy, ignoring");
            return Ok(());
        }
        if self.status != SessionStatus::Ready {
            return Err(SessionError::NotReady(self.status));
        }
        if self.snapshot.as_ref().map_or(true, |s| s.game_over) {
            return Ok(());
        }

        info!("Requesting AI move ({} simulations)", simulations);
        self.channel.run_ai_search(simulations)?;
        self.begin(InFlight::AiSearch);
        Ok(())
    }

    /// Legal destinations for the piece on `cell`; empty before the engine is
    /// loaded. Allowed while a broadcast command is in flight.
    pub async fn query_legal_destinations(&self, cell: CellIndex) -> Result<Vec<CellIndex>, SessionError> {
        if self.status == SessionStatus::Uninitialized {
            return Ok(Vec::new());
        }
        Ok(self.channel.query_legal_destinations(cell).await?)
    }

    // ---- settings ----

    /// Change the human side; `None` lets the AI play both sides.
    pub fn set_human_player(&mut self, human: Option<Player>) {
        info!("Human side set to {:?}", human);
        self.config.human_player = human;
        self.autoplay.rearm();
        self.run_autoplay();
    }

    /// Simulation budget for subsequent AI moves.
    pub fn set_simulation_count(&mut self, simulations: u32) -> Result<(), SessionError> {
        if simulations == 0 {
            return Err(SessionError::InvalidSimulations);
        }
        self.config.simulations = simulations;
        Ok(())
    }

    pub fn set_autoplay(&mut self, enabled: bool) {
        self.autoplay.set_enabled(enabled);
        if enabled {
            self.run_autoplay();
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // ---- event pumping ----

    /// Apply one engine event to the session state.
    pub fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::AiMove { action, evaluation } => {
                debug!("AI chose {} (evaluation {:.3})", action, evaluation);
                self.ai_value = evaluation;
                self.last_ai_action = Some(action);
            }
            EngineEvent::Snapshot { snapshot } => self.on_snapshot(snapshot),
            EngineEvent::Fault { command, reason } => self.on_fault(command, reason),
        }
    }

    /// Wait for and apply the next engine event.
    pub async fn next_event(&mut self) -> Result<EngineEvent, SessionError> {
        match self.channel.recv().await {
            Some(event) => {
                self.apply_event(event.clone());
                Ok(event)
            }
            None => {
                warn!("Engine event stream closed");
                self.in_flight = None;
                self.status = SessionStatus::Faulted;
                self.last_error = Some(SessionError::EngineStopped.to_string());
                Err(SessionError::EngineStopped)
            }
        }
    }

    /// Pump events until nothing is in flight, including AI moves that
    /// autoplay starts along the way.
    pub async fn settle(&mut self) -> Result<(), SessionError> {
        while self.in_flight.is_some() {
            self.next_event().await?;
        }
        Ok(())
    }

    /// Apply every event that has already arrived. Returns how many there were.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.channel.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    pub fn shutdown(&mut self) {
        self.channel.shutdown();
        self.in_flight = None;
        self.autoplay.settle();
    }

    // ---- accessors ----

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn snapshot(&self) -> Option<&BoardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn ai_value(&self) -> f32 {
        self.ai_value
    }

    pub fn last_ai_action(&self) -> Option<ActionId> {
        self.last_ai_action
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn human_player(&self) -> Option<Player> {
        self.config.human_player
    }

    pub fn simulations(&self) -> u32 {
        self.config.simulations
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Changes whenever the position may have changed under a partial move:
    /// on every reset, reversal and applied snapshot.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<CommandKind> {
        self.in_flight.map(InFlight::kind)
    }

    pub fn autoplay(&self) -> &AutoplayTrigger {
        &self.autoplay
    }

    pub fn pending_queries(&self) -> usize {
        self.channel.pending_queries()
    }

    /// True when the configured human side is to move in an unfinished game.
    pub fn is_human_turn(&self) -> bool {
        match (&self.snapshot, self.config.human_player) {
            (Some(snapshot), Some(human)) => !snapshot.game_over && snapshot.current_player == human,
            _ => false,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status,
            snapshot: self.snapshot.clone(),
            ai_value: self.ai_value,
            last_ai_action: self.last_ai_action,
            last_error: self.last_error.clone(),
            human_player: self.config.human_player,
            simulations: self.config.simulations,
        }
    }

    // ---- internals ----

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if let Some(in_flight) = self.in_flight {
            return Err(SessionError::Busy(in_flight.kind()));
        }
        match self.status {
            SessionStatus::Ready => Ok(()),
            status => Err(SessionError::NotReady(status)),
        }
    }

    fn begin(&mut self, command: InFlight) {
        self.in_flight = Some(command);
        self.status = SessionStatus::Busy;
    }

    fn on_snapshot(&mut self, snapshot: BoardSnapshot) {
        let finished = self.in_flight.take();
        self.status = SessionStatus::Ready;
        self.epoch += 1;

        debug!(
            "Snapshot after {:?}: move {}, {} to play",
            finished, snapshot.move_count, snapshot.current_player
        );

        match finished {
            Some(InFlight::Initialize) => {
                info!("Engine ready");
                self.last_error = None;
            }
            Some(InFlight::Reset) => {}
            Some(InFlight::Move) => {
                self.last_error = None;
                self.autoplay.rearm();
            }
            Some(InFlight::Reversal { second }) => {
                self.last_error = None;
                self.autoplay.rearm();
                if !second && self.needs_second_reversal(&snapshot) {
                    self.snapshot = Some(snapshot);
                    self.reverse_again();
                    return;
                }
            }
            Some(InFlight::AiSearch) => self.autoplay.settle(),
            None => warn!("Snapshot arrived with no command in flight"),
        }

        if snapshot.game_over {
            info!("Game over, winner: {:?}", snapshot.winner);
        }
        self.snapshot = Some(snapshot);
        self.run_autoplay();
    }

    fn on_fault(&mut self, command: CommandKind, reason: String) {
        let failed = self.in_flight.take();
        warn!("{} failed: {}", command, reason);
        self.last_error = Some(reason);

        match failed {
            Some(InFlight::Initialize) | Some(InFlight::Reset) => {
                self.status = SessionStatus::Faulted;
            }
            Some(InFlight::AiSearch) => {
                self.status = SessionStatus::Ready;
                self.autoplay.halt();
            }
            Some(_) => self.status = SessionStatus::Ready,
            None => warn!("Fault arrived with no command in flight"),
        }

        self.run_autoplay();
    }

    /// One undo only took back the AI's reply; take back the human move too.
    fn needs_second_reversal(&self, snapshot: &BoardSnapshot) -> bool {
        match self.config.human_player {
            Some(human) => snapshot.current_player != human && snapshot.move_count > 0,
            None => false,
        }
    }

    fn reverse_again(&mut self) {
        debug!("Reversing a second time to return the turn to the human");
        match self.channel.reverse_last_action() {
            Ok(()) => self.begin(InFlight::Reversal { second: true }),
            Err(e) => {
                warn!("Second reversal could not be sent: {}", e);
                self.last_error = Some(e.to_string());
                self.run_autoplay();
            }
        }
    }

    fn run_autoplay(&mut self) {
        if !self
            .autoplay
            .evaluate(self.status, self.snapshot.as_ref(), self.config.human_player)
        {
            return;
        }

        debug!("Autoplay handing the move to the AI");
        match self.request_ai_move(None) {
            Ok(()) if self.in_flight == Some(InFlight::AiSearch) => {}
            Ok(()) => self.autoplay.settle(),
            Err(e) => {
                warn!("Autoplay could not request an AI move: {}", e);
                self.last_error = Some(e.to_string());
                self.autoplay.halt();
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
