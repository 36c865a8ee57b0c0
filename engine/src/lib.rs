pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;
pub mod stockfish;
pub mod transport;
pub mod uci;

pub use error::EngineError;
pub use session::{EngineSession, EngineState, SearchId, SearchRequest, SessionEvent};
pub use stockfish::{find_stockfish_path, ProcessTransport, StockfishLauncher};
pub use transport::{EngineLauncher, EngineTransport, TransportEvent};
pub use uci::{parse_info_line, parse_uci_message, InfoUpdate, UciError, UciMessage};

/// Default search depth for position analysis.
pub const DEFAULT_DEPTH: u32 = 14;

/// Default number of principal variations requested (UCI `MultiPV`).
pub const DEFAULT_MULTIPV: u32 = 3;
