//! Engine analysis types shared by the engine bridge, the analysis controller
//! and the front end.

use serde::{Deserialize, Serialize};

/// Maximum number of moves shown when a line is rendered for display.
pub const MAX_DISPLAY_MOVES: usize = 14;

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EngineScore {
    #[serde(rename = "cp")]
    Centipawns(i32),
    Mate(i32),
}

impl EngineScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => {
                let pawns = *cp as f64 / 100.0;
                if *cp > 0 {
                    format!("+{:.2}", pawns)
                } else {
                    format!("{:.2}", pawns)
                }
            }
            Self::Mate(m) => format!("M{}", m),
        }
    }
}

impl std::fmt::Display for EngineScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// One principal variation, identified by its variation index (`multipv`)
/// within a single analysis batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLine {
    pub multipv: u32,
    pub depth: u32,
    /// Principal variation as UCI move strings.
    pub pv: Vec<String>,
    /// The same variation in SAN. Equal to `pv` when conversion failed.
    pub san: Vec<String>,
    pub score: Option<EngineScore>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
}

impl EngineLine {
    /// Up to [`MAX_DISPLAY_MOVES`] moves, preferring SAN over raw moves.
    pub fn display_moves(&self) -> String {
        let moves = if self.san.is_empty() {
            &self.pv
        } else {
            &self.san
        };
        moves
            .iter()
            .take(MAX_DISPLAY_MOVES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Score text, or an ellipsis while no score has been reported yet.
    pub fn display_score(&self) -> String {
        self.score
            .map(|s| s.display())
            .unwrap_or_else(|| "…".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_display() {
        assert_eq!(EngineScore::Centipawns(34).display(), "+0.34");
        assert_eq!(EngineScore::Centipawns(-120).display(), "-1.20");
        assert_eq!(EngineScore::Centipawns(0).display(), "0.00");
        assert_eq!(EngineScore::Mate(3).display(), "M3");
        assert_eq!(EngineScore::Mate(-2).display(), "M-2");
    }

    #[test]
    fn test_score_serializes_with_kind_tag() {
        let json = serde_json::to_string(&EngineScore::Centipawns(34)).unwrap();
        assert_eq!(json, r#"{"type":"cp","value":34}"#);
        let json = serde_json::to_string(&EngineScore::Mate(-2)).unwrap();
        assert_eq!(json, r#"{"type":"mate","value":-2}"#);
    }

    #[test]
    fn test_display_moves_prefers_san_and_truncates() {
        let pv: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
        let mut line = EngineLine {
            multipv: 1,
            depth: 10,
            pv: pv.clone(),
            san: Vec::new(),
            score: None,
            nodes: None,
            nps: None,
        };
        assert_eq!(line.display_moves().split(' ').count(), MAX_DISPLAY_MOVES);
        assert!(line.display_moves().starts_with("m0 m1"));
        assert_eq!(line.display_score(), "…");

        line.san = vec!["e4".to_string(), "e5".to_string()];
        assert_eq!(line.display_moves(), "e4 e5");
    }
}
