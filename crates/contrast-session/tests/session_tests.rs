//! Session-level tests.
//!
//! Most tests drive the store against a scripted engine that records every
//! call it receives; the rest use the bundled engine with a fixed seed.

use contrast_core::*;
use contrast_session::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    Initialize,
    Reset(Player),
    Apply(ActionId),
    Reverse,
    Search(u32),
    Query(CellIndex),
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// Engine double: flips the turn on every move and keeps a history for undo.
struct ScriptedEngine {
    log: CallLog,
    initialized: bool,
    opening: BoardSnapshot,
    current: BoardSnapshot,
    history: Vec<BoardSnapshot>,
    destinations: Vec<CellIndex>,
    fail_init: bool,
    reject_actions: bool,
    fail_search: bool,
    panic_on_apply: bool,
    query_delay: Option<Duration>,
}

impl ScriptedEngine {
    fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let engine = Self {
            log: Arc::clone(&log),
            initialized: false,
            opening: BoardSnapshot::initial(),
            current: BoardSnapshot::initial(),
            history: Vec::new(),
            destinations: Vec::new(),
            fail_init: false,
            reject_actions: false,
            fail_search: false,
            panic_on_apply: false,
            query_delay: None,
        };
        (engine, log)
    }

    fn with_opening(mut self, opening: BoardSnapshot) -> Self {
        self.current = opening.clone();
        self.opening = opening;
        self
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    fn advance(&mut self) {
        self.history.push(self.current.clone());
        self.current.move_count += 1;
        self.current.current_player = self.current.current_player.opponent();
    }
}

impl Engine for ScriptedEngine {
    fn initialize(&mut self, _payload: &StartupPayload) -> Result<(), EngineError> {
        self.record(Call::Initialize);
        if self.fail_init {
            return Err(EngineError::Load("model file missing".to_string()));
        }
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset(&mut self, player: Player) -> Result<(), EngineError> {
        self.record(Call::Reset(player));
        self.check()?;
        self.current = self.opening.clone();
        self.history.clear();
        Ok(())
    }

    fn apply_action(&mut self, action: ActionId) -> Result<(), EngineError> {
        self.record(Call::Apply(action));
        self.check()?;
        if self.panic_on_apply {
            panic!("corrupted board");
        }
        if self.reject_actions {
            return Err(GameError::IllegalMove.into());
        }
        self.advance();
        Ok(())
    }

    fn reverse_last_action(&mut self) -> Result<(), EngineError> {
        self.record(Call::Reverse);
        self.check()?;
        self.current = self.history.pop().ok_or(EngineError::NothingToReverse)?;
        Ok(())
    }

    fn run_ai_search(&mut self, simulations: u32) -> Result<SearchOutcome, EngineError> {
        self.record(Call::Search(simulations));
        self.check()?;
        if self.fail_search {
            return Err(EngineError::NoLegalMove);
        }
        self.advance();
        Ok(SearchOutcome {
            action: ActionId(42),
            value: -0.5,
        })
    }

    fn legal_destinations(&self, cell: CellIndex) -> Vec<CellIndex> {
        self.record(Call::Query(cell));
        if let Some(delay) = self.query_delay {
            std::thread::sleep(delay);
        }
        self.destinations.clone()
    }

    fn snapshot(&self) -> Result<BoardSnapshot, EngineError> {
        self.check()?;
        Ok(self.current.clone())
    }
}

fn config(human: Option<Player>) -> SessionConfig {
    SessionConfig {
        human_player: human,
        simulations: 8,
        seed: Some(17),
        ..SessionConfig::default()
    }
}

fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

fn searches(log: &CallLog) -> usize {
    calls(log).iter().filter(|c| matches!(c, Call::Search(_))).count()
}

fn clear(log: &CallLog) {
    log.lock().unwrap().clear();
}

fn cell(i: usize) -> CellIndex {
    CellIndex::new(i).unwrap()
}

async fn scripted_store(engine: ScriptedEngine, human: Option<Player>) -> SessionStore {
    let mut store = SessionStore::with_engine(engine, config(human)).unwrap();
    store.initialize().await.unwrap();
    store.settle().await.unwrap();
    store
}

#[tokio::test]
async fn test_fresh_reset_for_player_one() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = scripted_store(engine, Some(Player::One)).await;

    store.reset_game(Some(Player::One)).unwrap();
    store.settle().await.unwrap();

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.current_player, Player::One);
    assert!(!snapshot.game_over);
    assert_eq!(snapshot.tile_counts.as_array(), [3, 1, 3, 1]);
    assert_eq!(snapshot.move_count, 0);

    assert_eq!(store.status(), SessionStatus::Ready);
    assert_eq!(searches(&log), 0);
    assert!(!store.autoplay().is_outstanding());
}

#[tokio::test]
async fn test_reset_for_player_two_lets_ai_open() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = scripted_store(engine, Some(Player::Two)).await;
    clear(&log);

    store.reset_game(Some(Player::Two)).unwrap();
    store.settle().await.unwrap();

    assert_eq!(calls(&log), vec![Call::Reset(Player::Two), Call::Search(8)]);
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.current_player, Player::Two);
    assert_eq!(snapshot.move_count, 1);
    assert_eq!(store.ai_value(), -0.5);
    assert_eq!(store.last_ai_action(), Some(ActionId(42)));
}

#[tokio::test]
async fn test_move_without_supply_commits_immediately() {
    let mut opening = BoardSnapshot::initial();
    opening.pieces = [None; CELL_COUNT];
    opening.pieces[6] = Some(Player::One);
    opening.pieces[18] = Some(Player::Two);
    opening.tile_counts = ResourceCounts::new([0, 0, 3, 1]);

    let (mut engine, log) = ScriptedEngine::new();
    engine.destinations = vec![cell(11), cell(7)];
    let engine = engine.with_opening(opening);
    let mut store = scripted_store(engine, Some(Player::One)).await;
    store.set_autoplay(false);

    let mut composer = MoveComposer::new();
    let selected = composer.select_cell(&mut store, cell(6)).await.unwrap();
    assert_eq!(
        selected,
        Transition::Selected {
            origin: cell(6),
            destinations: vec![cell(11), cell(7)],
        }
    );

    let committed = composer.select_cell(&mut store, cell(11)).await.unwrap();
    let expected = ActionId((6 * 25 + 11) * 51);
    assert_eq!(committed, Transition::Committed(expected));
    assert!(composer.is_idle());
    assert_eq!(composer.pending_move(), None);

    store.settle().await.unwrap();
    assert!(calls(&log).contains(&Call::Apply(expected)));
}

#[tokio::test]
async fn test_illegal_move_is_recoverable() {
    let (mut engine, _log) = ScriptedEngine::new();
    engine.reject_actions = true;
    let mut store = scripted_store(engine, Some(Player::One)).await;
    let before = store.snapshot().cloned();

    store.submit_move(ActionId(1)).unwrap();
    assert_eq!(store.status(), SessionStatus::Busy);
    store.settle().await.unwrap();

    assert_eq!(store.status(), SessionStatus::Ready);
    assert_eq!(store.snapshot().cloned(), before);
    assert_eq!(store.last_error(), Some("Illegal Move"));
}

#[tokio::test]
async fn test_undo_takes_back_ai_reply_and_human_move() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = scripted_store(engine, Some(Player::One)).await;

    store.submit_move(ActionId(3)).unwrap();
    store.settle().await.unwrap();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.move_count, 2, "human move plus AI reply");
    assert_eq!(snapshot.current_player, Player::One);
    clear(&log);

    store.reverse_last_action().unwrap();
    store.settle().await.unwrap();

    assert_eq!(calls(&log), vec![Call::Reverse, Call::Reverse]);
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.move_count, 0);
    assert_eq!(snapshot.current_player, Player::One);
    assert_eq!(store.ai_value(), 0.0);
    assert_eq!(store.last_ai_action(), None);
    assert_eq!(store.view().last_ai_action, None);
    assert_eq!(store.last_error(), None);
}

#[tokio::test]
async fn test_ai_move_budget_override() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = SessionStore::with_engine(engine, config(None)).unwrap();
    store.set_autoplay(false);
    store.initialize().await.unwrap();
    clear(&log);

    store.request_ai_move(Some(64)).unwrap();
    store.settle().await.unwrap();
    store.request_ai_move(None).unwrap();
    store.settle().await.unwrap();
    assert!(matches!(
        store.request_ai_move(Some(0)),
        Err(SessionError::InvalidSimulations)
    ));

    assert_eq!(calls(&log), vec![Call::Search(64), Call::Search(8)]);
    assert_eq!(store.simulations(), 8);
}

#[tokio::test]
async fn test_spectator_undo_reverses_once() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = SessionStore::with_engine(engine, config(None)).unwrap();
    store.set_autoplay(false);
    store.initialize().await.unwrap();

    store.request_ai_move(None).unwrap();
    store.settle().await.unwrap();
    clear(&log);

    store.reverse_last_action().unwrap();
    store.settle().await.unwrap();
    assert_eq!(calls(&log), vec![Call::Reverse]);
    assert_eq!(store.snapshot().unwrap().move_count, 0);
}

#[tokio::test]
async fn test_second_command_while_busy_is_rejected() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = scripted_store(engine, Some(Player::One)).await;
    store.set_autoplay(false);
    clear(&log);

    store.submit_move(ActionId(5)).unwrap();
    assert!(matches!(
        store.submit_move(ActionId(6)),
        Err(SessionError::Busy(CommandKind::ApplyAction))
    ));
    assert!(matches!(
        store.reverse_last_action(),
        Err(SessionError::Busy(CommandKind::ApplyAction))
    ));
    assert!(matches!(
        store.reset_game(None),
        Err(SessionError::Busy(CommandKind::ApplyAction))
    ));
    store.settle().await.unwrap();

    assert_eq!(calls(&log), vec![Call::Apply(ActionId(5))]);
}

#[tokio::test]
async fn test_autoplay_fires_once_while_busy() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = SessionStore::with_engine(engine, config(Some(Player::Two))).unwrap();
    store.initialize().await.unwrap();

    // The opening snapshot handed the move to the AI.
    assert_eq!(store.in_flight(), Some(CommandKind::RunAiSearch));
    store.request_ai_move(None).unwrap();
    for _ in 0..5 {
        store.set_autoplay(true);
        store.poll_events();
    }
    store.settle().await.unwrap();

    assert_eq!(searches(&log), 1);
    assert!(store.is_human_turn());
}

#[tokio::test]
async fn test_ai_failure_halts_autoplay() {
    let (mut engine, log) = ScriptedEngine::new();
    engine.fail_search = true;
    let store = scripted_store(engine, Some(Player::Two)).await;

    assert_eq!(searches(&log), 1);
    assert_eq!(store.status(), SessionStatus::Ready);
    assert_eq!(store.last_error(), Some("No legal move available"));
    assert!(store.autoplay().is_halted());
}

#[tokio::test]
async fn test_initialize_failure_faults_session() {
    let (mut engine, log) = ScriptedEngine::new();
    engine.fail_init = true;
    let mut store = SessionStore::with_engine(engine, config(Some(Player::One))).unwrap();
    store.initialize().await.unwrap();

    assert_eq!(store.status(), SessionStatus::Faulted);
    assert_eq!(
        store.last_error(),
        Some("Failed to load Game Engine: model file missing")
    );
    assert!(matches!(
        store.submit_move(ActionId(0)),
        Err(SessionError::NotReady(SessionStatus::Faulted))
    ));

    // Retrying goes back to the engine rather than being swallowed.
    store.initialize().await.unwrap();
    assert_eq!(calls(&log), vec![Call::Initialize, Call::Initialize]);
    assert_eq!(store.status(), SessionStatus::Faulted);
}

#[tokio::test]
async fn test_engine_panic_is_reported_and_survived() {
    let (mut engine, _log) = ScriptedEngine::new();
    engine.panic_on_apply = true;
    let mut store = scripted_store(engine, Some(Player::One)).await;

    store.submit_move(ActionId(0)).unwrap();
    store.settle().await.unwrap();
    assert_eq!(store.status(), SessionStatus::Ready);
    assert_eq!(store.last_error(), Some("Engine fault: corrupted board"));

    store.reset_game(None).unwrap();
    store.settle().await.unwrap();
    assert_eq!(store.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_query_timeout_leaves_no_record() {
    let (mut engine, _log) = ScriptedEngine::new();
    engine.query_delay = Some(Duration::from_millis(300));
    let mut store = SessionStore::with_engine(
        engine,
        SessionConfig {
            query_timeout: Some(Duration::from_millis(20)),
            ..config(Some(Player::One))
        },
    )
    .unwrap();
    store.initialize().await.unwrap();

    let result = store.query_legal_destinations(cell(20)).await;
    assert!(matches!(
        result,
        Err(SessionError::Channel(ChannelError::QueryTimedOut { .. }))
    ));
    assert_eq!(store.pending_queries(), 0);
}

#[tokio::test]
async fn test_abandoned_query_leaves_no_record() {
    let (mut engine, _log) = ScriptedEngine::new();
    engine.query_delay = Some(Duration::from_millis(300));
    let store = scripted_store(engine, Some(Player::One)).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        store.query_legal_destinations(cell(20)),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(store.pending_queries(), 0);
}

#[tokio::test]
async fn test_query_answered_while_command_in_flight() {
    let (mut engine, log) = ScriptedEngine::new();
    engine.destinations = vec![cell(15)];
    let mut store = scripted_store(engine, Some(Player::One)).await;
    store.set_autoplay(false);

    store.submit_move(ActionId(9)).unwrap();
    let cells = store.query_legal_destinations(cell(20)).await.unwrap();
    assert_eq!(cells, vec![cell(15)]);
    assert!(store.is_busy(), "event not pumped yet");

    store.settle().await.unwrap();
    assert!(calls(&log).contains(&Call::Query(cell(20))));
    assert_eq!(store.pending_queries(), 0);
}

// ---- bundled engine ----

#[tokio::test]
async fn test_spectator_game_applies_one_event_at_a_time() {
    let (engine, log) = ScriptedEngine::new();
    let mut store = SessionStore::with_engine(engine, config(None)).unwrap();
    store.initialize().await.unwrap();
    assert_eq!(store.snapshot().unwrap().move_count, 0);
    assert_eq!(store.in_flight(), Some(CommandKind::RunAiSearch));

    let mut snapshots = 0;
    while snapshots < 3 {
        match store.next_event().await.unwrap() {
            EngineEvent::AiMove { action, .. } => {
                assert_eq!(store.last_ai_action(), Some(action));
            }
            EngineEvent::Snapshot { snapshot } => {
                snapshots += 1;
                assert_eq!(snapshot.move_count, snapshots);
                assert_eq!(store.snapshot(), Some(&snapshot));
                // The next AI move is already on its way.
                assert_eq!(store.in_flight(), Some(CommandKind::RunAiSearch));
            }
            EngineEvent::Fault { reason, .. } => panic!("unexpected fault: {}", reason),
        }
    }

    // Taking the side the AI is about to hand the turn to stops the game.
    let mover = store.snapshot().unwrap().current_player;
    store.set_human_player(Some(mover.opponent()));
    store.settle().await.unwrap();

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.move_count, 4);
    assert_eq!(snapshot.current_player, mover.opponent());
    assert!(store.is_human_turn());
    assert_eq!(store.status(), SessionStatus::Ready);
    assert_eq!(searches(&log), 4);
}

#[tokio::test]
async fn test_move_counter_tracks_moves_and_undo() {
    let mut store = SessionStore::new(config(None)).unwrap();
    store.set_autoplay(false);
    store.initialize().await.unwrap();

    for expected in 1..=4 {
        store.request_ai_move(None).unwrap();
        store.settle().await.unwrap();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.move_count, expected);
        assert!((-1.0..=1.0).contains(&store.ai_value()));
    }

    for expected in (0..4).rev() {
        store.reverse_last_action().unwrap();
        store.settle().await.unwrap();
        assert_eq!(store.snapshot().unwrap().move_count, expected);
    }
    assert_eq!(store.snapshot(), Some(&BoardSnapshot::initial()));

    store.reverse_last_action().unwrap();
    store.settle().await.unwrap();
    assert_eq!(store.last_error(), Some("Nothing to undo"));
    assert_eq!(store.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_human_against_ai_game() {
    let mut store = SessionStore::new(config(Some(Player::One))).unwrap();
    store.initialize().await.unwrap();
    let mut composer = MoveComposer::new();

    for _ in 0..3 {
        let snapshot = store.snapshot().unwrap().clone();
        if snapshot.game_over {
            break;
        }
        assert!(store.is_human_turn());

        let origin = CellIndex::all()
            .find(|&c| snapshot.occupant(c) == Some(Player::One) && !store_destinations_empty(&store, c))
            .expect("some piece can move");
        let Transition::Selected { destinations, .. } = composer.select_cell(&mut store, origin).await.unwrap() else {
            panic!("piece was not selected");
        };

        match composer.select_cell(&mut store, destinations[0]).await.unwrap() {
            Transition::AwaitingModification(_) => {
                composer.skip_modification(&mut store).unwrap();
            }
            Transition::Committed(_) => {}
            other => panic!("unexpected transition {:?}", other),
        }

        let before = snapshot.move_count;
        store.settle().await.unwrap();
        let after = store.snapshot().unwrap();
        assert!(after.move_count == before + 2 || after.game_over);
        for count in after.tile_counts.as_array() {
            assert!(count <= 3);
        }
    }
}

fn store_destinations_empty(store: &SessionStore, origin: CellIndex) -> bool {
    let snapshot = store.snapshot().unwrap();
    ContrastGame::from_snapshot(snapshot)
        .legal_destinations(origin)
        .is_empty()
}

#[tokio::test]
async fn test_changing_sides_hands_turn_to_ai() {
    let mut store = SessionStore::new(config(Some(Player::One))).unwrap();
    store.initialize().await.unwrap();
    assert!(!store.is_busy());

    store.set_human_player(Some(Player::Two));
    assert_eq!(store.in_flight(), Some(CommandKind::RunAiSearch));
    store.settle().await.unwrap();
    assert_eq!(store.snapshot().unwrap().current_player, Player::Two);
}
