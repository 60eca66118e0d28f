//! Terminal front end for a Contrast session.

use contrast_core::{decode, BoardSnapshot, CellIndex, Player, SurfaceKind, BOARD_SIZE};
use contrast_session::{
    config, ComposerError, EngineEvent, MoveComposer, SessionConfig, SessionError, SessionStatus, SessionStore, Transition,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  <cell>         select a piece, destination or tile target (e.g. c1)
  black | gray   place a tile with the pending move
  skip           play the pending move without a tile
  cancel         drop the current selection
  undo           take back your last move
  new [1|2]      start a new game
  ai [n]         let the AI play the side to move
  sims <n>       simulations per AI move
  side <0|1|2>   your side (0 lets the AI play both)
  state          dump the session as JSON
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::from_env()?;
    info!("Starting Contrast session...");

    let mut store = SessionStore::new(config)?;
    store.initialize().await?;
    if store.status() == SessionStatus::Faulted {
        anyhow::bail!(
            "engine failed to start: {}",
            store.last_error().unwrap_or("unknown error")
        );
    }

    let mut composer = MoveComposer::new();
    println!("{}", HELP);
    print_session(&mut store, &mut composer);

    // Engine events are applied one at a time between reads, so the board
    // keeps updating and input stays live while the AI plays.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&line, &mut store, &mut composer).await? {
                    break;
                }
                print_session(&mut store, &mut composer);
            }
            event = store.next_event(), if store.is_busy() => {
                match event? {
                    EngineEvent::AiMove { action, evaluation } => {
                        let played = decode(action)
                            .map(|m| m.to_string())
                            .unwrap_or_else(|_| action.to_string());
                        println!("AI played {} (eval {:+.2})", played, evaluation);
                    }
                    EngineEvent::Snapshot { .. } | EngineEvent::Fault { .. } => {
                        print_session(&mut store, &mut composer);
                    }
                }
            }
        }
    }

    store.shutdown();
    Ok(())
}

/// Run one input line. Returns false when the user asked to quit.
async fn handle_line(
    line: &str,
    store: &mut SessionStore,
    composer: &mut MoveComposer,
) -> anyhow::Result<bool> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return Ok(false),
        ["help"] => println!("{}", HELP),
        ["state"] => println!("{}", serde_json::to_string_pretty(&store.view())?),
        ["cancel"] => show(Ok(composer.cancel())),
        ["skip"] => show(composer.skip_modification(store)),
        ["black"] => show(composer.choose_modification(store, SurfaceKind::Black)),
        ["gray"] | ["grey"] => show(composer.choose_modification(store, SurfaceKind::Gray)),
        ["undo"] => report(store.reverse_last_action()),
        ["new"] => report(store.reset_game(None)),
        ["new", side] => match config::parse_side("new", side) {
            Ok(Some(player)) => report(store.reset_game(Some(player))),
            _ => println!("usage: new [1|2]"),
        },
        ["ai"] => report(store.request_ai_move(None)),
        ["ai", n] => match n.parse() {
            Ok(n) => report(store.request_ai_move(Some(n))),
            Err(_) => println!("usage: ai [simulations]"),
        },
        ["sims", n] => match n.parse() {
            Ok(n) => report(store.set_simulation_count(n)),
            Err(_) => println!("usage: sims <n>"),
        },
        ["side", side] => match config::parse_side("side", side) {
            Ok(human) => store.set_human_player(human),
            Err(e) => println!("error: {}", e),
        },
        [cell] => match cell.parse::<CellIndex>() {
            Ok(cell) => show(composer.select_cell(store, cell).await),
            Err(_) => println!("unknown command, type help"),
        },
        _ => println!("unknown command, type help"),
    }
    Ok(true)
}

fn report(result: Result<(), SessionError>) {
    if let Err(e) = result {
        println!("error: {}", e);
    }
}

fn show(result: Result<Transition, ComposerError>) {
    match result {
        Ok(Transition::Selected { origin, destinations }) => {
            let cells: Vec<String> = destinations.iter().map(|c| c.to_string()).collect();
            println!("{} selected, moves: {}", origin, cells.join(" "));
        }
        Ok(Transition::AwaitingModification(_)) => println!("black, gray or skip?"),
        Ok(Transition::AwaitingTarget(kind)) => println!("choose a cell for the {} tile", kind),
        Ok(Transition::Committed(action)) => println!("played {}", action),
        Ok(Transition::Deselected) | Ok(Transition::Cancelled) | Ok(Transition::Ignored) => {}
        Err(e) => println!("error: {}", e),
    }
}

fn print_session(store: &mut SessionStore, composer: &mut MoveComposer) {
    composer.sync(store);
    let Some(snapshot) = store.snapshot() else {
        println!("[{}]", store.status());
        return;
    };

    print_board(snapshot, composer);

    let counts = snapshot.tile_counts;
    let supply = |p: Player| {
        format!(
            "{} black {} gray",
            counts.get(p, SurfaceKind::Black),
            counts.get(p, SurfaceKind::Gray)
        )
    };
    println!("P1: {} | P2: {}", supply(Player::One), supply(Player::Two));

    if snapshot.game_over {
        match snapshot.winner {
            Some(winner) => println!("{} wins after {} moves", winner, snapshot.move_count),
            None => println!("draw after {} moves", snapshot.move_count),
        }
    } else {
        println!(
            "move {}, {} to play, AI eval {:+.2}",
            snapshot.move_count,
            snapshot.current_player,
            store.ai_value()
        );
    }

    if let Some(error) = store.last_error() {
        println!("! {}", error);
    }
    store.clear_error();
}

fn print_board(snapshot: &BoardSnapshot, composer: &MoveComposer) {
    let selected = composer.selected();
    let destinations = composer.destinations();

    for y in 0..BOARD_SIZE {
        let mut row = format!("{} ", BOARD_SIZE - y);
        for x in 0..BOARD_SIZE {
            let Some(cell) = CellIndex::from_xy(x, y) else {
                continue;
            };
            let surface = match snapshot.surface(cell) {
                SurfaceKind::White => ' ',
                SurfaceKind::Black => '#',
                SurfaceKind::Gray => '+',
            };
            let piece = match snapshot.occupant(cell) {
                Some(Player::One) => '1',
                Some(Player::Two) => '2',
                None if destinations.contains(&cell) => 'o',
                None => '.',
            };
            let marker = if selected == Some(cell) { '*' } else { surface };
            row.push(marker);
            row.push(piece);
            row.push(' ');
        }
        println!("{}", row.trim_end());
    }
    println!("   a  b  c  d  e");
}
