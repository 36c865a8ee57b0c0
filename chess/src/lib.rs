pub mod analysis;
pub mod converters;
pub mod fen;
pub mod line;
pub mod san;
pub mod uci;

pub use analysis::{EngineLine, EngineScore, MAX_DISPLAY_MOVES};
pub use converters::*;
pub use fen::{format_fen, normalize_fen, parse_fen, FenError};
pub use line::to_san_line;
pub use san::format_san;
pub use uci::{convert_uci_castling_to_cozy, format_uci_move, parse_uci_move, UciMoveError};
