//! Principal-variation rendering: UCI coordinate moves to SAN.

use crate::fen::{parse_fen, FenError};
use crate::san::format_san;
use crate::uci::{convert_uci_castling_to_cozy, parse_uci_move, UciMoveError};

#[derive(Debug, thiserror::Error)]
enum LineError {
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error(transparent)]
    Move(#[from] UciMoveError),
}

/// Render a UCI move sequence as SAN, replaying it from `fen`.
///
/// Never fails. Moves shorter than four characters and moves that are illegal
/// at their point in the line are passed through verbatim; replay continues
/// from the last position that was successfully reached. If the line cannot be
/// replayed at all (bad FEN, malformed coordinates) the raw moves are returned
/// unchanged, never a partial mix.
pub fn to_san_line(fen: &str, pv: &[String]) -> Vec<String> {
    if fen.trim().is_empty() || pv.is_empty() {
        return Vec::new();
    }

    replay(fen, pv).unwrap_or_else(|_| pv.to_vec())
}

fn replay(fen: &str, pv: &[String]) -> Result<Vec<String>, LineError> {
    let mut board = parse_fen(fen)?;
    let mut san_moves = Vec::with_capacity(pv.len());

    for raw in pv {
        if raw.len() < 4 {
            san_moves.push(raw.clone());
            continue;
        }

        let mv = convert_uci_castling_to_cozy(&board, parse_uci_move(raw)?);
        if !board.is_legal(mv) {
            san_moves.push(raw.clone());
            continue;
        }

        san_moves.push(format_san(&board, mv));
        board.play_unchecked(mv);
    }

    Ok(san_moves)
}
