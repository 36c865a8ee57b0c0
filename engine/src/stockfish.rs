use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;

use crate::transport::{EngineLauncher, EngineTransport, TransportEvent};
use crate::EngineError;

/// Grace period between `quit` and a hard kill.
const QUIT_GRACE: Duration = Duration::from_secs(1);

/// Engine running as a child process speaking UCI over stdin/stdout.
pub struct ProcessTransport {
    label: String,
    process: Child,
    stdin: Option<ChildStdin>,
    output_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    terminated: bool,
}

impl ProcessTransport {
    /// Spawn the engine executable at `path` and start reading its output.
    #[tracing::instrument(level = "info", skip(label), fields(label = %label))]
    pub fn spawn(path: &Path, label: String) -> Result<Self, EngineError> {
        tracing::debug!("Spawning engine process");
        let mut process = tokio::process::Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e)
            })?;

        let stdin = process.stdin.take().ok_or(EngineError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(EngineError::NoStdout)?;

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let reader_label = label.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!(label = %reader_label, "Engine stdout EOF - engine closed");
                        let _ = output_tx.send(TransportEvent::Closed);
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim_end();
                        tracing::trace!(label = %reader_label, "UCI << {}", trimmed);
                        if output_tx
                            .send(TransportEvent::Line(trimmed.to_string()))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(label = %reader_label, "Error reading engine stdout: {}", e);
                        let _ = output_tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            tracing::debug!(label = %reader_label, "Output reader task exiting");
        });

        Ok(Self {
            label,
            process,
            stdin: Some(stdin),
            output_rx: Some(output_rx),
            terminated: false,
        })
    }
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        let stdin = self.stdin.as_mut().ok_or(EngineError::Closed)?;
        tracing::trace!(label = %self.label, "UCI >> {}", command);
        stdin.write_all(command.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, EngineError> {
        self.output_rx.take().ok_or(EngineError::AlreadySubscribed)
    }

    async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        tracing::info!(label = %self.label, "Terminating engine process");

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.write_all(b"quit\n").await;
            let _ = stdin.flush().await;
        }
        if tokio::time::timeout(QUIT_GRACE, self.process.wait())
            .await
            .is_err()
        {
            tracing::warn!(label = %self.label, "Engine ignored quit, killing");
            let _ = self.process.kill().await;
        }
    }
}

/// Launches Stockfish child processes.
#[derive(Debug, Clone, Default)]
pub struct StockfishLauncher {
    /// Explicit executable path. Searched for when unset.
    pub path: Option<PathBuf>,
    pub label: Option<String>,
}

impl StockfishLauncher {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl EngineLauncher for StockfishLauncher {
    async fn launch(&self) -> Result<Box<dyn EngineTransport>, EngineError> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Found Stockfish at: {:?}", path);
        let label = self.label.clone().unwrap_or_else(|| "stockfish".to_string());
        Ok(Box::new(ProcessTransport::spawn(&path, label)?))
    }
}

/// Find Stockfish executable in common locations, then on `PATH`.
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(PathBuf::from).find(|p| p.is_file()) {
        return Some(found);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join("stockfish"))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let launcher = StockfishLauncher::new(Some(PathBuf::from(
            "/nonexistent/definitely-not-stockfish",
        )));
        let result = launcher.launch().await;
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }
}
