use chess::EngineScore;

/// Incoming message from UCI engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// Search concluded. `mv` is kept verbatim, it may be `(none)`.
    BestMove { mv: String, ponder: Option<String> },
    Info(InfoUpdate),
}

/// Structured content of one `info ... pv ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoUpdate {
    pub depth: u32,
    /// Variation index, 1 when the engine does not report one.
    pub multipv: u32,
    /// Principal variation as UCI move strings, in engine order.
    pub pv: Vec<String>,
    pub score: Option<EngineScore>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => {
            if tokens.len() < 2 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let ponder = if tokens.len() >= 4 && tokens[2] == "ponder" {
                Some(tokens[3].to_string())
            } else {
                None
            };
            Ok(UciMessage::BestMove {
                mv: tokens[1].to_string(),
                ponder,
            })
        }

        Some(&"info") => parse_info_line(line)
            .map(UciMessage::Info)
            .ok_or_else(|| crate::UciError::IncompleteInfo(line.to_string())),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an `info` line into an analysis update.
///
/// Returns `None` for anything that is not an update: lines without the
/// `info ` marker, lines without a positive depth, and lines without a move
/// list after `pv`. Keyed fields may come in any order before `pv`; every
/// token after `pv` is a move.
pub fn parse_info_line(line: &str) -> Option<InfoUpdate> {
    let rest = line.trim_end().strip_prefix("info ")?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    let mut depth: u32 = 0;
    let mut multipv: u32 = 1;
    let mut score = None;
    let mut nodes = None;
    let mut nps = None;
    let mut pv: &[&str] = &[];

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                if let Some(value) = tokens.get(i + 1) {
                    if let Ok(parsed) = value.parse() {
                        depth = parsed;
                    }
                    i += 1;
                }
            }
            "multipv" => {
                if let Some(value) = tokens.get(i + 1) {
                    if let Ok(parsed) = value.parse() {
                        multipv = parsed;
                    }
                    i += 1;
                }
            }
            "score" => {
                if let (Some(kind), Some(value)) = (tokens.get(i + 1), tokens.get(i + 2)) {
                    score = match (*kind, value.parse::<i32>()) {
                        ("cp", Ok(v)) => Some(EngineScore::Centipawns(v)),
                        ("mate", Ok(v)) => Some(EngineScore::Mate(v)),
                        _ => score,
                    };
                    i += 2;
                }
            }
            "nodes" => {
                if let Some(value) = tokens.get(i + 1) {
                    nodes = value.parse().ok().or(nodes);
                    i += 1;
                }
            }
            "nps" => {
                if let Some(value) = tokens.get(i + 1) {
                    nps = value.parse().ok().or(nps);
                    i += 1;
                }
            }
            "pv" => {
                pv = &tokens[i + 1..];
                break;
            }
            // Free text to end of line
            "string" => break,
            _ => {}
        }
        i += 1;
    }

    if pv.is_empty() || depth == 0 {
        return None;
    }

    Some(InfoUpdate {
        depth,
        multipv,
        pv: pv.iter().map(|mv| mv.to_string()).collect(),
        score,
        nodes,
        nps,
    })
}
