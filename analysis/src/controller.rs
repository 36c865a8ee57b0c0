//! Per-position analysis controller.
//!
//! Position changes are debounced; only the last position of a burst is sent
//! to the engine. Engine lines are accepted only when tagged with the search
//! id this controller issued for its current position.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use engine::{
    parse_info_line, parse_uci_message, EngineLauncher, EngineSession, EngineState, SearchId,
    SearchRequest, SessionEvent, UciMessage, DEFAULT_DEPTH, DEFAULT_MULTIPV,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Sleep};
use tracing::Instrument;

use crate::state::{line_from_update, AnalysisSessionState};

/// Quiet period after the last position change before analysis starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub depth: u32,
    pub multipv: u32,
    pub debounce: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            multipv: DEFAULT_MULTIPV,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

enum ControllerCommand {
    SetPosition(Option<String>),
    Restart,
    Shutdown { reply: oneshot::Sender<()> },
}

/// Cheap, cloneable handle to an analysis controller actor.
#[derive(Clone)]
pub struct AnalysisController {
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    state_rx: watch::Receiver<AnalysisSessionState>,
}

impl AnalysisController {
    pub fn spawn(launcher: Arc<dyn EngineLauncher>, options: AnalysisOptions) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(AnalysisSessionState::default());

        let actor = ControllerActor {
            session: EngineSession::spawn(Arc::clone(&launcher), "analysis"),
            launcher,
            options,
            events: None,
            position: None,
            debounce: None,
            current_search: None,
            state_tx,
        };
        tokio::spawn(
            actor
                .run(cmd_rx)
                .instrument(tracing::info_span!("analysis_controller")),
        );

        Self { cmd_tx, state_rx }
    }

    /// Change the position of interest. `None` clears it and stops analysis.
    pub fn set_position(&self, fen: Option<String>) {
        let _ = self.cmd_tx.send(ControllerCommand::SetPosition(fen));
    }

    /// Re-analyze the current position now, replacing a failed engine.
    pub fn restart(&self) {
        let _ = self.cmd_tx.send(ControllerCommand::Restart);
    }

    pub fn state(&self) -> AnalysisSessionState {
        self.state_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AnalysisSessionState> {
        self.state_rx.clone()
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(ControllerCommand::Shutdown { reply: tx })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

struct ControllerActor {
    launcher: Arc<dyn EngineLauncher>,
    session: EngineSession,
    options: AnalysisOptions,
    events: Option<broadcast::Receiver<SessionEvent>>,
    position: Option<String>,
    debounce: Option<Pin<Box<Sleep>>>,
    /// Search issued for `position`. Lines with any other tag are stale.
    current_search: Option<SearchId>,
    state_tx: watch::Sender<AnalysisSessionState>,
}

impl ControllerActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>) {
        self.events = self.session.subscribe().await.ok();

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ControllerCommand::SetPosition(fen)) => self.set_position(fen),
                        Some(ControllerCommand::Restart) => self.restart().await,
                        Some(ControllerCommand::Shutdown { reply }) => {
                            self.teardown().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            self.teardown().await;
                            break;
                        }
                    }
                }

                () = debounce_elapsed(&mut self.debounce) => {
                    self.debounce = None;
                    self.start_analysis().await;
                }

                event = next_event(&mut self.events) => {
                    match event {
                        Ok(event) => self.handle_event(event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Dropped {} engine events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            self.events = None;
                        }
                    }
                }
            }
        }

        tracing::debug!("Analysis controller exited");
    }

    fn update_state(&self, f: impl FnOnce(&mut AnalysisSessionState)) {
        self.state_tx.send_modify(f);
    }

    fn set_position(&mut self, fen: Option<String>) {
        let fen = fen.filter(|f| !f.trim().is_empty());
        if fen == self.position {
            return;
        }
        tracing::debug!(fen = ?fen, "Position changed");

        self.session.stop();
        self.current_search = None;
        self.update_state(|s| {
            s.lines.clear();
            s.analyzing = false;
        });

        self.debounce = fen
            .is_some()
            .then(|| Box::pin(tokio::time::sleep_until(Instant::now() + self.options.debounce)));
        self.position = fen;
    }

    async fn restart(&mut self) {
        self.debounce = None;
        self.session.stop();
        self.current_search = None;
        self.update_state(|s| s.lines.clear());
        self.start_analysis().await;
    }

    async fn start_analysis(&mut self) {
        let Some(fen) = self.position.clone() else {
            return;
        };
        if self.session.state() == EngineState::Failed {
            self.replace_session().await;
        }

        let request = SearchRequest::new(fen, self.options.depth, self.options.multipv);
        match self.session.analyze(request) {
            Ok(id) => {
                tracing::debug!(search = id, "Analysis started");
                self.current_search = Some(id);
                self.update_state(|s| {
                    s.lines.clear();
                    s.analyzing = true;
                    s.error = None;
                });
            }
            Err(e) => {
                tracing::warn!("Failed to start analysis: {}", e);
                self.current_search = None;
                self.update_state(|s| {
                    s.analyzing = false;
                    s.error = Some(e.to_string());
                });
            }
        }
    }

    async fn replace_session(&mut self) {
        tracing::info!("Replacing failed engine session");
        self.session.shutdown().await;
        self.session = EngineSession::spawn(Arc::clone(&self.launcher), "analysis");
        self.events = self.session.subscribe().await.ok();
        self.update_state(|s| {
            s.ready = false;
            s.error = None;
        });
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Ready => self.update_state(|s| s.ready = true),
            SessionEvent::Error(message) => {
                self.current_search = None;
                self.update_state(|s| {
                    s.ready = false;
                    s.analyzing = false;
                    s.error = Some(message);
                });
            }
            SessionEvent::Line { search, line } => {
                if search.is_none() || search != self.current_search {
                    return;
                }
                let Some(fen) = self.position.as_deref() else {
                    return;
                };

                if let Some(update) = parse_info_line(&line) {
                    let engine_line = line_from_update(fen, update);
                    self.update_state(|s| s.merge(engine_line));
                } else if let Ok(UciMessage::BestMove { .. }) = parse_uci_message(&line) {
                    self.update_state(|s| s.analyzing = false);
                }
            }
        }
    }

    async fn teardown(&mut self) {
        self.debounce = None;
        self.current_search = None;
        self.session.stop();
        self.session.shutdown().await;
        self.update_state(|s| s.analyzing = false);
    }
}

async fn debounce_elapsed(debounce: &mut Option<Pin<Box<Sleep>>>) {
    match debounce.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<SessionEvent, broadcast::error::RecvError> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
