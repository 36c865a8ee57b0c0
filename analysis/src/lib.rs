//! Position analysis on top of an engine session.

pub mod controller;
pub mod state;

pub use controller::{AnalysisController, AnalysisOptions, DEFAULT_DEBOUNCE};
pub use state::{line_from_update, AnalysisSessionState};
