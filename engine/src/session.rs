//! Engine session: one lazily started engine, driven through a tokio actor.
//!
//! The handle is cheap to clone. All engine I/O happens on the actor task,
//! which processes commands and engine output strictly in arrival order.
//!
//! Before every search the actor sends `stop` followed by `isready`, and only
//! issues the new search once every outstanding `isready` has been answered.
//! Lines are tagged with the [`SearchId`] whose `go` was last sent, so output
//! from a superseded search is never attributed to a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::Instrument;

use crate::transport::{EngineLauncher, EngineTransport, TransportEvent};
use crate::uci::{parse_uci_message, UciMessage};
use crate::EngineError;

/// Identifies one `analyze()` request within a session.
pub type SearchId = u64;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No engine started yet.
    Uninitialized,
    /// Engine started, waiting for `uciok`.
    Initializing,
    Ready,
    /// A `go` is in flight.
    Analyzing,
    /// Engine failed to start or died. Terminal for this session.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw engine output. `search` is the search whose `go` had been sent
    /// when the line arrived, `None` while a new search waits for `readyok`.
    Line {
        search: Option<SearchId>,
        line: String,
    },
    /// Handshake acknowledged (`uciok` or `readyok`).
    Ready,
    /// Engine failed to load or the transport broke.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub fen: String,
    pub depth: u32,
    pub multipv: u32,
}

impl SearchRequest {
    pub fn new(fen: impl Into<String>, depth: u32, multipv: u32) -> Self {
        Self {
            fen: fen.into(),
            depth,
            multipv,
        }
    }
}

enum SessionCommand {
    Analyze {
        id: SearchId,
        request: SearchRequest,
    },
    Stop,
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<SessionEvent>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to an engine session actor.
#[derive(Clone)]
pub struct EngineSession {
    label: Arc<str>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    state_rx: watch::Receiver<EngineState>,
    next_search: Arc<AtomicU64>,
}

impl EngineSession {
    /// Start the session actor. The engine itself is launched on first use.
    pub fn spawn(launcher: Arc<dyn EngineLauncher>, label: impl Into<String>) -> Self {
        let label: Arc<str> = Arc::from(label.into());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(EngineState::Uninitialized);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = SessionActor {
            launcher,
            transport: None,
            output: None,
            state_tx,
            event_tx,
            pending: None,
            probes_outstanding: 0,
            live_search: None,
        };
        tokio::spawn(
            actor
                .run(cmd_rx)
                .instrument(tracing::info_span!("engine_session", label = %label)),
        );

        Self {
            label,
            cmd_tx,
            state_rx,
            next_search: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Receive every event emitted after this call.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<SessionEvent>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx })?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Queue a new search, superseding any search in flight.
    ///
    /// Starts the engine if it is not running yet. Returns the id that tags
    /// this search's output lines.
    pub fn analyze(&self, request: SearchRequest) -> Result<SearchId, EngineError> {
        if self.state() == EngineState::Failed {
            return Err(EngineError::Failed("engine session has failed".to_string()));
        }
        let id = self.next_search.fetch_add(1, Ordering::Relaxed);
        self.send(SessionCommand::Analyze { id, request })?;
        Ok(id)
    }

    /// Cancel the current or queued search. Fire-and-forget, idempotent.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Stop);
    }

    /// Terminate the engine and close all subscriptions. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(SessionCommand::Shutdown { reply: tx }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, cmd: SessionCommand) -> Result<(), EngineError> {
        self.cmd_tx.send(cmd).map_err(|_| EngineError::Closed)
    }
}

struct SessionActor {
    launcher: Arc<dyn EngineLauncher>,
    transport: Option<Box<dyn EngineTransport>>,
    output: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    state_tx: watch::Sender<EngineState>,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Search waiting for its readiness probes to be acknowledged.
    pending: Option<(SearchId, SearchRequest)>,
    probes_outstanding: u32,
    /// Search whose `go` was sent last.
    live_search: Option<SearchId>,
}

impl SessionActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>) {
        tracing::info!("Engine session started");

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        self.teardown().await;
                        break;
                    };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }

                event = next_output(&mut self.output) => {
                    self.handle_output(event).await;
                }
            }
        }

        tracing::info!("Engine session exited");
    }

    fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, ?state, "Engine state changed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Returns false once the session should exit.
    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Analyze { id, request } => self.request_search(id, request).await,
            SessionCommand::Stop => {
                self.pending = None;
                if self.transport.is_some() {
                    tracing::debug!("Stopping search");
                    self.send_line("stop").await;
                }
            }
            SessionCommand::Subscribe { reply } => {
                let _ = reply.send(self.event_tx.subscribe());
            }
            SessionCommand::Shutdown { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn request_search(&mut self, id: SearchId, request: SearchRequest) {
        if self.state() == EngineState::Failed {
            tracing::warn!(search = id, "Ignoring analyze request on failed session");
            return;
        }
        if !self.ensure_engine().await {
            return;
        }

        tracing::info!(search = id, fen = %request.fen, depth = request.depth, multipv = request.multipv, "Analysis requested");
        self.pending = Some((id, request));
        self.live_search = None;
        self.send_line("stop").await;
        self.send_line("isready").await;
        if self.transport.is_some() {
            self.probes_outstanding += 1;
        }
    }

    /// Launch the engine on first use. Returns false if it could not be started.
    async fn ensure_engine(&mut self) -> bool {
        if self.transport.is_some() {
            return true;
        }

        self.set_state(EngineState::Initializing);
        let mut transport = match self.launcher.launch().await {
            Ok(transport) => transport,
            Err(e) => {
                self.fail(format!("Failed to start engine: {e}")).await;
                return false;
            }
        };
        match transport.subscribe() {
            Ok(output) => self.output = Some(output),
            Err(e) => {
                transport.terminate().await;
                self.fail(e.to_string()).await;
                return false;
            }
        }
        self.transport = Some(transport);
        self.send_line("uci").await;
        self.transport.is_some()
    }

    async fn handle_output(&mut self, event: TransportEvent) {
        let line = match event {
            TransportEvent::Line(line) => line,
            TransportEvent::Error(e) => {
                self.fail(format!("Engine transport error: {e}")).await;
                return;
            }
            TransportEvent::Closed => {
                self.fail("Engine exited unexpectedly".to_string()).await;
                return;
            }
        };

        let message = parse_uci_message(&line).ok();
        self.emit(SessionEvent::Line {
            search: self.live_search,
            line,
        });

        match message {
            Some(UciMessage::UciOk) => {
                if self.state() == EngineState::Initializing {
                    tracing::info!("Engine initialized");
                    self.set_state(EngineState::Ready);
                }
                self.emit(SessionEvent::Ready);
            }
            Some(UciMessage::ReadyOk) => {
                self.probes_outstanding = self.probes_outstanding.saturating_sub(1);
                if self.state() == EngineState::Initializing {
                    self.set_state(EngineState::Ready);
                }
                self.emit(SessionEvent::Ready);
                if self.probes_outstanding == 0 {
                    if let Some((id, request)) = self.pending.take() {
                        self.start_search(id, request).await;
                    }
                }
            }
            Some(UciMessage::BestMove { mv, .. }) => {
                tracing::debug!(bestmove = %mv, "Search concluded");
                if self.state() == EngineState::Analyzing {
                    self.set_state(EngineState::Ready);
                }
            }
            _ => {}
        }
    }

    async fn start_search(&mut self, id: SearchId, request: SearchRequest) {
        let multipv = request.multipv.max(1);
        let depth = request.depth.max(1);

        self.send_line(&format!("setoption name MultiPV value {multipv}"))
            .await;
        self.send_line("ucinewgame").await;
        self.send_line(&format!("position fen {}", request.fen)).await;
        self.send_line(&format!("go depth {depth}")).await;

        if self.transport.is_some() {
            tracing::debug!(search = id, "Search started");
            self.live_search = Some(id);
            self.set_state(EngineState::Analyzing);
        }
    }

    /// Write one command. A write failure fails the session.
    async fn send_line(&mut self, command: &str) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send(command).await {
            self.fail(format!("Failed to write to engine: {e}")).await;
        }
    }

    async fn fail(&mut self, message: String) {
        if self.state() == EngineState::Failed {
            return;
        }
        tracing::error!("Engine session failed: {}", message);
        self.release_engine().await;
        self.set_state(EngineState::Failed);
        self.emit(SessionEvent::Error(message));
    }

    async fn release_engine(&mut self) {
        self.pending = None;
        self.probes_outstanding = 0;
        self.live_search = None;
        self.output = None;
        if let Some(mut transport) = self.transport.take() {
            transport.terminate().await;
        }
    }

    async fn teardown(&mut self) {
        tracing::info!("Engine session shutting down");
        self.release_engine().await;
    }
}

async fn next_output(output: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>) -> TransportEvent {
    match output.as_mut() {
        Some(rx) => rx.recv().await.unwrap_or(TransportEvent::Closed),
        None => std::future::pending().await,
    }
}
