//! Standard Algebraic Notation rendering.

use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::converters::{file_to_char, format_square, rank_to_char, san_piece_letter};

/// Format a legal move as SAN ("Nf3", "exd5", "O-O", "e8=Q+", "Qh7#").
///
/// `mv` must be legal on `board` and use cozy-chess castling encoding
/// (king takes own rook). Callers are expected to check legality first.
pub fn format_san(board: &Board, mv: Move) -> String {
    let piece = match board.piece_on(mv.from) {
        Some(piece) => piece,
        None => return crate::format_uci_move(mv),
    };

    let mut san = if is_castle(board, mv, piece) {
        if (mv.to.file() as u8) > (mv.from.file() as u8) {
            "O-O".to_string()
        } else {
            "O-O-O".to_string()
        }
    } else {
        let mut san = String::new();
        let is_capture = is_capture(board, mv, piece);

        match san_piece_letter(piece) {
            Some(letter) => {
                san.push(letter);
                san.push_str(&disambiguation(board, mv, piece));
            }
            None => {
                if is_capture {
                    san.push(file_to_char(mv.from.file()));
                }
            }
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion.and_then(san_piece_letter) {
            san.push('=');
            san.push(promo);
        }
        san
    };

    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.status() == GameStatus::Won {
        san.push('#');
    } else if !after.checkers().is_empty() {
        san.push('+');
    }

    san
}

fn is_castle(board: &Board, mv: Move, piece: Piece) -> bool {
    piece == Piece::King && board.colors(board.side_to_move()).has(mv.to)
}

fn is_capture(board: &Board, mv: Move, piece: Piece) -> bool {
    if board.colors(!board.side_to_move()).has(mv.to) {
        return true;
    }
    // En passant: pawn changes file onto an empty square
    piece == Piece::Pawn && mv.from.file() != mv.to.file()
}

/// File, rank or full-square prefix needed to tell `mv` apart from other
/// legal moves of the same piece kind to the same square.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|moves| {
        if moves.piece == piece && moves.from != mv.from {
            for other in moves {
                if other.to == mv.to {
                    rivals.push(other.from);
                }
            }
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|sq| sq.file() == mv.from.file());
    let shares_rank = rivals.iter().any(|sq| sq.rank() == mv.from.rank());

    if !shares_file {
        file_to_char(mv.from.file()).to_string()
    } else if !shares_rank {
        rank_to_char(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}
