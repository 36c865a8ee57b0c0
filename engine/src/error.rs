#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Stockfish not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine has no stdin")]
    NoStdin,
    #[error("Engine has no stdout")]
    NoStdout,
    #[error("Engine output already subscribed")]
    AlreadySubscribed,
    #[error("Engine error: {0}")]
    Failed(String),
    #[error("Engine session closed")]
    Closed,
}
