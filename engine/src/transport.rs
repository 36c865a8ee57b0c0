//! Boundary between the engine session and whatever actually runs the engine.
//!
//! A transport carries plain-text UCI command lines in and output lines back
//! out. The session only relies on ordering: lines come back in the order the
//! engine wrote them, commands reach the engine in the order they were sent.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::EngineError;

/// Output of a running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One output line, without its line terminator.
    Line(String),
    /// The transport broke (read failure, crash). Terminal.
    Error(String),
    /// The engine closed its output. Terminal.
    Closed,
}

#[async_trait]
pub trait EngineTransport: Send {
    /// Send one command line. The line terminator is added by the transport.
    async fn send(&mut self, command: &str) -> Result<(), EngineError>;

    /// Take the output stream. Can only be taken once.
    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, EngineError>;

    /// Stop the engine and release its resources. Safe to call repeatedly.
    async fn terminate(&mut self);
}

/// Starts engine instances on demand.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn EngineTransport>, EngineError>;
}
