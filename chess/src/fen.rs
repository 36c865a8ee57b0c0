use cozy_chess::Board;

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let fen = fen.trim();
    if fen.is_empty() {
        return Err(FenError::Empty);
    }

    fen.parse().map_err(|_| FenError::InvalidFormat(fen.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    // cozy-chess Display renders standard FEN
    board.to_string()
}

/// Reduce a FEN to its position key: placement, side to move, castling and
/// en passant fields. Move counters are dropped. Strings with fewer than four
/// fields are returned unchanged.
pub fn normalize_fen(fen: &str) -> String {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() < 4 {
        return fen.to_string();
    }
    parts[..4].join(" ")
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Empty FEN")]
    Empty,
    #[error("Invalid FEN: {0}")]
    InvalidFormat(String),
}
