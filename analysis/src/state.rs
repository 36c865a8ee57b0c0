use chess::{to_san_line, EngineLine};
use engine::InfoUpdate;

/// Analysis state for the position currently being displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSessionState {
    /// Engine initialized and responsive.
    pub ready: bool,
    /// A search is in flight.
    pub analyzing: bool,
    pub error: Option<String>,
    /// Variations ordered by `multipv`, ascending.
    pub lines: Vec<EngineLine>,
}

impl AnalysisSessionState {
    /// Merge one variation by its index: replace in place or append, then
    /// keep the list sorted. Fields missing from the update keep their
    /// previous values.
    pub fn merge(&mut self, mut line: EngineLine) {
        match self.lines.iter_mut().find(|l| l.multipv == line.multipv) {
            Some(existing) => {
                line.score = line.score.or(existing.score);
                line.nodes = line.nodes.or(existing.nodes);
                line.nps = line.nps.or(existing.nps);
                *existing = line;
            }
            None => self.lines.push(line),
        }
        self.lines.sort_by_key(|l| l.multipv);
    }

    /// Short status text for the analysis panel.
    pub fn status_text(&self) -> &'static str {
        if self.error.is_some() {
            "Engine error"
        } else if !self.ready {
            "Warming up Stockfish…"
        } else if self.analyzing {
            "Analyzing current position…"
        } else {
            "Ready"
        }
    }
}

/// Build a displayable line from a parsed update, rendering SAN from `fen`.
pub fn line_from_update(fen: &str, update: InfoUpdate) -> EngineLine {
    let san = to_san_line(fen, &update.pv);
    EngineLine {
        multipv: update.multipv,
        depth: update.depth,
        pv: update.pv,
        san,
        score: update.score,
        nodes: update.nodes,
        nps: update.nps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::EngineScore;

    fn line(multipv: u32, depth: u32, score: Option<i32>) -> EngineLine {
        EngineLine {
            multipv,
            depth,
            pv: vec!["e2e4".to_string()],
            san: vec!["e4".to_string()],
            score: score.map(EngineScore::Centipawns),
            nodes: None,
            nps: None,
        }
    }

    #[test]
    fn test_merge_replaces_appends_and_sorts() {
        let mut state = AnalysisSessionState::default();
        for (multipv, depth) in [(1, 10), (2, 10), (1, 11), (3, 10), (2, 11)] {
            state.merge(line(multipv, depth, Some(depth as i32)));
        }

        let indices: Vec<u32> = state.lines.iter().map(|l| l.multipv).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(state.lines[0].depth, 11);
        assert_eq!(state.lines[1].depth, 11);
        assert_eq!(state.lines[2].depth, 10);
    }

    #[test]
    fn test_merge_keeps_previous_score_when_update_has_none() {
        let mut state = AnalysisSessionState::default();
        let mut first = line(1, 8, Some(25));
        first.nodes = Some(1000);
        state.merge(first);
        state.merge(line(1, 9, None));

        assert_eq!(state.lines[0].depth, 9);
        assert_eq!(state.lines[0].score, Some(EngineScore::Centipawns(25)));
        assert_eq!(state.lines[0].nodes, Some(1000));
    }

    #[test]
    fn test_status_text() {
        let mut state = AnalysisSessionState::default();
        assert_eq!(state.status_text(), "Warming up Stockfish…");
        state.ready = true;
        assert_eq!(state.status_text(), "Ready");
        state.analyzing = true;
        assert_eq!(state.status_text(), "Analyzing current position…");
        state.error = Some("boom".to_string());
        assert_eq!(state.status_text(), "Engine error");
    }

    #[test]
    fn test_line_from_update_renders_san() {
        let update = engine::parse_info_line("info depth 12 multipv 2 score cp 34 pv e2e4 e7e5")
            .unwrap();
        let line = line_from_update(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            update,
        );
        assert_eq!(line.multipv, 2);
        assert_eq!(line.san, vec!["e4", "e5"]);
        assert_eq!(line.display_score(), "+0.34");
    }
}
