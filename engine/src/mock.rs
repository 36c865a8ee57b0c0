//! Scripted engine for testing - only compiled in test mode or with mock feature

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{EngineLauncher, EngineTransport, TransportEvent};
use crate::uci::parse_info_line;
use crate::EngineError;

/// Launcher whose engines answer the UCI handshake and replay scripted
/// search output. Clones share state, so a test keeps one clone to inspect
/// what the session sent.
#[derive(Clone, Default)]
pub struct ScriptedLauncher {
    shared: Arc<Mutex<Shared>>,
}

#[derive(Default)]
struct Shared {
    sent: Vec<String>,
    launches: usize,
    terminated: usize,
    fail_launch: bool,
    hold_searches: bool,
    default_output: Vec<String>,
    output_by_fen: HashMap<String, Vec<String>>,
    /// Lines flushed ahead of every `readyok`.
    output_before_ready: Vec<String>,
    /// Output channel of the most recently launched engine.
    live: Option<mpsc::UnboundedSender<TransportEvent>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info lines emitted after every `go`.
    pub fn with_search_output(self, lines: Vec<String>) -> Self {
        self.shared.lock().unwrap().default_output = lines;
        self
    }

    /// Info lines emitted after `go` when the last position sent was `fen`.
    pub fn with_search_output_for(self, fen: &str, lines: Vec<String>) -> Self {
        self.shared
            .lock()
            .unwrap()
            .output_by_fen
            .insert(fen.to_string(), lines);
        self
    }

    /// Lines emitted between `isready` and its `readyok`, like output an
    /// engine had buffered from the search it was just told to stop.
    pub fn with_output_before_ready(self, lines: Vec<String>) -> Self {
        self.shared.lock().unwrap().output_before_ready = lines;
        self
    }

    /// Searches keep running until `stop`, like an infinite search.
    pub fn hold_searches(self) -> Self {
        self.shared.lock().unwrap().hold_searches = true;
        self
    }

    /// Every launch fails.
    pub fn fail_launch(self) -> Self {
        self.shared.lock().unwrap().fail_launch = true;
        self
    }

    /// Simulate the running engine dying.
    pub fn crash(&self) {
        if let Some(tx) = self.shared.lock().unwrap().live.take() {
            let _ = tx.send(TransportEvent::Closed);
        }
    }

    /// Every command sent to any engine launched so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.shared.lock().unwrap().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.shared.lock().unwrap().sent.clear();
    }

    pub fn launches(&self) -> usize {
        self.shared.lock().unwrap().launches
    }

    pub fn terminated(&self) -> usize {
        self.shared.lock().unwrap().terminated
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn EngineTransport>, EngineError> {
        let mut shared = self.shared.lock().unwrap();
        shared.launches += 1;
        if shared.fail_launch {
            return Err(EngineError::NotFound);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.live = Some(tx.clone());
        Ok(Box::new(ScriptedTransport {
            shared: Arc::clone(&self.shared),
            tx,
            rx: Some(rx),
            position: None,
            searching: false,
            terminated: false,
        }))
    }
}

pub struct ScriptedTransport {
    shared: Arc<Mutex<Shared>>,
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    position: Option<String>,
    searching: bool,
    terminated: bool,
}

impl ScriptedTransport {
    fn emit(&self, line: impl Into<String>) {
        let _ = self.tx.send(TransportEvent::Line(line.into()));
    }

    fn finish_search(&mut self, output: &[String]) {
        self.searching = false;
        let best = output
            .iter()
            .rev()
            .find_map(|line| parse_info_line(line))
            .and_then(|update| update.pv.first().cloned())
            .unwrap_or_else(|| "(none)".to_string());
        self.emit(format!("bestmove {best}"));
    }

    fn search_output(&self) -> Vec<String> {
        let shared = self.shared.lock().unwrap();
        self.position
            .as_ref()
            .and_then(|fen| shared.output_by_fen.get(fen))
            .unwrap_or(&shared.default_output)
            .clone()
    }
}

#[async_trait]
impl EngineTransport for ScriptedTransport {
    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        if self.terminated {
            return Err(EngineError::Closed);
        }
        let hold = {
            let mut shared = self.shared.lock().unwrap();
            shared.sent.push(command.to_string());
            shared.hold_searches
        };

        match command.split_whitespace().next() {
            Some("uci") => {
                self.emit("id name Scripted");
                self.emit("uciok");
            }
            Some("isready") => {
                let buffered = self.shared.lock().unwrap().output_before_ready.clone();
                for line in buffered {
                    self.emit(line);
                }
                self.emit("readyok");
            }
            Some("position") => {
                self.position = command
                    .strip_prefix("position fen ")
                    .map(|fen| fen.to_string());
            }
            Some("go") => {
                let output = self.search_output();
                for line in &output {
                    self.emit(line.clone());
                }
                if hold {
                    self.searching = true;
                } else {
                    self.finish_search(&output);
                }
            }
            Some("stop") if self.searching => {
                let output = self.search_output();
                self.finish_search(&output);
            }
            _ => {}
        }
        Ok(())
    }

    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, EngineError> {
        self.rx.take().ok_or(EngineError::AlreadySubscribed)
    }

    async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.searching = false;
        self.shared.lock().unwrap().terminated += 1;
    }
}
