//! Engine worker loop.
//!
//! Runs on its own thread, owns the engine outright and answers requests one
//! at a time in arrival order. Every broadcast request produces exactly one
//! snapshot or one fault (an AI search sends its move ahead of the snapshot).

use crate::protocol::{CommandKind, EngineEvent, EngineRequest, WorkerReply};
use contrast_core::{BoardSnapshot, Engine, EngineError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub(crate) fn run<E: Engine>(
    mut engine: E,
    requests: Receiver<EngineRequest>,
    replies: UnboundedSender<WorkerReply>,
) {
    info!("Engine worker started");

    while let Ok(request) = requests.recv() {
        if matches!(request, EngineRequest::Shutdown) {
            break;
        }

        let query_id = match &request {
            EngineRequest::QueryLegalDestinations { id, .. } => Some(*id),
            _ => None,
        };
        let kind = request.kind();

        let messages = match panic::catch_unwind(AssertUnwindSafe(|| handle(&mut engine, request))) {
            Ok(messages) => messages,
            Err(payload) => {
                let reason = EngineError::Internal(panic_message(payload.as_ref())).to_string();
                error!("Engine panicked while handling {:?}: {}", kind, reason);
                match (query_id, kind) {
                    (Some(id), _) => vec![WorkerReply::LegalDestinations { id, cells: Vec::new() }],
                    (None, Some(command)) => vec![fault(command, reason)],
                    (None, None) => Vec::new(),
                }
            }
        };

        for message in messages {
            if replies.send(message).is_err() {
                warn!("Reply router gone, stopping engine worker");
                return;
            }
        }
    }

    info!("Engine worker stopped");
}

fn handle<E: Engine>(engine: &mut E, request: EngineRequest) -> Vec<WorkerReply> {
    match request {
        EngineRequest::Initialize { payload } => {
            let result = if engine.is_initialized() {
                debug!("Engine already initialized, re-sending snapshot");
                engine.snapshot()
            } else {
                engine.initialize(&payload).and_then(|_| engine.snapshot())
            };
            vec![broadcast(CommandKind::Initialize, result)]
        }

        EngineRequest::Reset { player } => {
            let result = engine.reset(player).and_then(|_| engine.snapshot());
            vec![broadcast(CommandKind::Reset, result)]
        }

        EngineRequest::ApplyAction { action } => {
            debug!("Applying action {}", action);
            let result = engine.apply_action(action).and_then(|_| engine.snapshot());
            vec![broadcast(CommandKind::ApplyAction, result)]
        }

        EngineRequest::ReverseLastAction => {
            let result = engine.reverse_last_action().and_then(|_| engine.snapshot());
            vec![broadcast(CommandKind::ReverseLastAction, result)]
        }

        EngineRequest::RunAiSearch { simulations } => {
            let result = engine
                .run_ai_search(simulations)
                .and_then(|outcome| Ok((outcome, engine.snapshot()?)));
            match result {
                Ok((outcome, snapshot)) => {
                    debug!(
                        "AI played {} (evaluation {:.3}) after {} simulations",
                        outcome.action, outcome.value, simulations
                    );
                    vec![
                        WorkerReply::Event {
                            event: EngineEvent::AiMove {
                                action: outcome.action,
                                evaluation: outcome.value,
                            },
                        },
                        WorkerReply::Event {
                            event: EngineEvent::Snapshot { snapshot },
                        },
                    ]
                }
                Err(e) => vec![fault(CommandKind::RunAiSearch, e.to_string())],
            }
        }

        EngineRequest::QueryLegalDestinations { id, cell } => {
            let cells = engine.legal_destinations(cell);
            vec![WorkerReply::LegalDestinations { id, cells }]
        }

        EngineRequest::Shutdown => Vec::new(),
    }
}

fn broadcast(command: CommandKind, result: Result<BoardSnapshot, EngineError>) -> WorkerReply {
    match result {
        Ok(snapshot) => WorkerReply::Event {
            event: EngineEvent::Snapshot { snapshot },
        },
        Err(e) => fault(command, e.to_string()),
    }
}

fn fault(command: CommandKind, reason: String) -> WorkerReply {
    WorkerReply::Event {
        event: EngineEvent::Fault { command, reason },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
