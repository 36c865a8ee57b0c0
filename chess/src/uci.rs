//! UCI (Universal Chess Interface) move utilities

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::{format_piece, format_square, parse_square};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(UciMoveError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let to = parse_square(&s[2..4]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;

    let promotion = match s.get(4..5) {
        None => None,
        Some("q") => Some(Piece::Queen),
        Some("r") => Some(Piece::Rook),
        Some("b") => Some(Piece::Bishop),
        Some("n") => Some(Piece::Knight),
        Some(_) => return Err(UciMoveError::InvalidPromotion(s.to_string())),
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// Only king moves are rewritten, and only when the rewritten move is legal
/// on `board`. Anything else is returned unchanged.
pub fn convert_uci_castling_to_cozy(board: &Board, mv: Move) -> Move {
    if board.piece_on(mv.from) != Some(Piece::King) || mv.promotion.is_some() {
        return mv;
    }
    if !matches!(mv.from.file(), File::E) || mv.from.rank() != mv.to.rank() {
        return mv;
    }

    let rook_file = match (mv.from.rank(), mv.to.file()) {
        (Rank::First | Rank::Eighth, File::G) => File::H,
        (Rank::First | Rank::Eighth, File::C) => File::A,
        _ => return mv,
    };

    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };

    if board.is_legal(converted) {
        converted
    } else {
        mv
    }
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}
