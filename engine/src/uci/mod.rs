pub mod parser;

pub use parser::{parse_info_line, parse_uci_message, InfoUpdate, UciMessage};

/// Classification failures for a single engine output line. None of these are
/// fatal: callers treat them as protocol noise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciError {
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
    #[error("Info line carries no analysis update: {0}")]
    IncompleteInfo(String),
}
