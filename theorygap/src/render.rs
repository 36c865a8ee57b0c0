//! Terminal rendering of analysis lines, job progress and error positions.

use analysis::AnalysisSessionState;
use chess::EngineLine;
use jobs::{ErrorPosition, JobProgress};

const BAR_WIDTH: usize = 30;
/// Example games listed per error position.
const MAX_EXAMPLE_GAMES: usize = 2;

/// `1. +0.34  d20  e4 e5 Nf3`
pub fn format_line(line: &EngineLine) -> String {
    format!(
        "{}. {:>6}  d{:<2}  {}",
        line.multipv,
        line.display_score(),
        line.depth,
        line.display_moves()
    )
}

pub fn format_analysis(state: &AnalysisSessionState) -> String {
    let mut out = String::new();
    out.push_str(state.status_text());
    if let Some(error) = &state.error {
        out.push_str(": ");
        out.push_str(error);
    }
    for line in &state.lines {
        out.push('\n');
        out.push_str(&format_line(line));
    }
    out
}

/// `[#########.....................] Analyzing games (30.0%)`
pub fn format_progress(progress: &JobProgress) -> String {
    let filled = ((progress.bar_percent().clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round()
        as usize;
    let filled = filled.min(BAR_WIDTH);
    let mut out = format!(
        "[{}{}] {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        progress.status_text()
    );
    if let Some(error) = &progress.error {
        out.push(' ');
        out.push_str(error);
    }
    out
}

pub fn format_error_position(index: usize, position: &ErrorPosition) -> String {
    let fen = &position.bad_fen;
    let mut out = format!(
        "{}. {}\n   seen {}x, error rate {:.0}% (inaccuracies {}, mistakes {}, blunders {}, suboptimal {})",
        index + 1,
        fen.normalized_fen_before,
        fen.times_seen,
        fen.error_rate * 100.0,
        fen.inaccuracy_count,
        fen.mistake_count,
        fen.error_count,
        fen.suboptimal_count,
    );
    if let Some(side) = &fen.side_to_move {
        out.push_str(&format!(", {side} to move"));
    }
    for game in position.moves.iter().take(MAX_EXAMPLE_GAMES) {
        out.push_str(&format!(
            "\n   {} as {} vs {} [{}] {}",
            game.mv, game.color, game.opponent, game.eco, game.url
        ));
    }
    out
}
