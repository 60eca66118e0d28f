//! Asynchronous transport to the engine worker.
//!
//! Broadcast commands are fire-and-forget: their outcome arrives later as an
//! [`EngineEvent`] through [`EngineChannel::recv`]. Legal destination queries
//! are correlated by id and answered directly to the caller, without going
//! through the event queue.

use crate::protocol::{EngineEvent, EngineRequest, RequestId, WorkerReply};
use crate::worker;
use contrast_core::{ActionId, CellIndex, Engine, Player, StartupPayload};
use dashmap::DashMap;
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the engine worker thread
pub const WORKER_THREAD_NAME: &str = "contrast-engine";

type PendingQueries = DashMap<RequestId, oneshot::Sender<Vec<CellIndex>>>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to start engine worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Engine worker is not running")]
    Disconnected,

    #[error("Legal destination query was abandoned")]
    QueryDropped,

    #[error("Legal destination query for {cell} timed out after {after:?}")]
    QueryTimedOut { cell: CellIndex, after: Duration },
}

/// Handle to an engine running on its own thread.
pub struct EngineChannel {
    requests: std_mpsc::Sender<EngineRequest>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    pending: Arc<PendingQueries>,
    query_timeout: Option<Duration>,
    worker: Option<thread::JoinHandle<()>>,
    router: JoinHandle<()>,
}

impl EngineChannel {
    /// Move `engine` onto a worker thread and start routing its replies.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<E: Engine>(engine: E, query_timeout: Option<Duration>) -> Result<Self, ChannelError> {
        let (request_tx, request_rx) = std_mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker::run(engine, request_rx, reply_tx))?;

        let pending = Arc::new(PendingQueries::new());
        let router = tokio::spawn(route(reply_rx, event_tx, Arc::clone(&pending)));

        info!("Engine channel started");

        Ok(Self {
            requests: request_tx,
            events: event_rx,
            pending,
            query_timeout,
            worker: Some(worker),
            router,
        })
    }

    fn send(&self, request: EngineRequest) -> Result<(), ChannelError> {
        if self.worker.is_none() {
            return Err(ChannelError::Disconnected);
        }
        debug!("Sending {:?}", request.kind());
        self.requests
            .send(request)
            .map_err(|_| ChannelError::Disconnected)
    }

    pub fn initialize(&self, payload: StartupPayload) -> Result<(), ChannelError> {
        self.send(EngineRequest::Initialize { payload })
    }

    pub fn reset(&self, player: Player) -> Result<(), ChannelError> {
        self.send(EngineRequest::Reset { player })
    }

    pub fn apply_action(&self, action: ActionId) -> Result<(), ChannelError> {
        self.send(EngineRequest::ApplyAction { action })
    }

    pub fn reverse_last_action(&self) -> Result<(), ChannelError> {
        self.send(EngineRequest::ReverseLastAction)
    }

    pub fn run_ai_search(&self, simulations: u32) -> Result<(), ChannelError> {
        self.send(EngineRequest::RunAiSearch { simulations })
    }

    /// Ask the engine where the piece on `cell` may move.
    ///
    /// The correlation record is removed once answered, on timeout, or when
    /// the returned future is dropped early.
    pub async fn query_legal_destinations(&self, cell: CellIndex) -> Result<Vec<CellIndex>, ChannelError> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        };

        self.send(EngineRequest::QueryLegalDestinations { id, cell })?;

        match self.query_timeout {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(answer) => answer.map_err(|_| ChannelError::QueryDropped),
                Err(_) => {
                    warn!("Query {} for {} timed out after {:?}", id, cell, after);
                    Err(ChannelError::QueryTimedOut { cell, after })
                }
            },
            None => rx.await.map_err(|_| ChannelError::QueryDropped),
        }
    }

    /// Wait for the next broadcast event. `None` once the worker is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Take the next broadcast event if one is already queued.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.events.try_recv().ok()
    }

    /// Number of queries still waiting for an answer
    pub fn pending_queries(&self) -> usize {
        self.pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker after its current command and abandon open queries.
    pub fn shutdown(&mut self) {
        if self.worker.is_some() {
            let _ = self.send(EngineRequest::Shutdown);
            self.worker = None;
            self.pending.clear();
            info!("Engine channel shut down");
        }
    }
}

impl Drop for EngineChannel {
    fn drop(&mut self) {
        self.shutdown();
        self.router.abort();
    }
}

struct PendingGuard {
    pending: Arc<PendingQueries>,
    id: RequestId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

async fn route(
    mut replies: mpsc::UnboundedReceiver<WorkerReply>,
    events: mpsc::UnboundedSender<EngineEvent>,
    pending: Arc<PendingQueries>,
) {
    while let Some(reply) = replies.recv().await {
        match reply {
            WorkerReply::Event { event } => {
                if events.send(event).is_err() {
                    break;
                }
            }
            WorkerReply::LegalDestinations { id, cells } => match pending.remove(&id) {
                Some((_, caller)) => {
                    let _ = caller.send(cells);
                }
                None => debug!("Dropping answer to expired query {}", id),
            },
        }
    }

    // Worker is gone; nobody will answer the rest.
    pending.clear();
    debug!("Reply router finished");
}
