//! Runtime configuration for theorygap.
//!
//! Every value has a compile-time default and can be overridden through a
//! dedicated environment variable.

use std::path::PathBuf;
use std::time::Duration;

/// Default base URL of the analysis service.
const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Default job poll interval (in milliseconds).
const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;

/// Get the base URL of the analysis service.
///
/// Priority:
/// 1. `THEORYGAP_API_BASE` env variable if set and non-empty
/// 2. `http://localhost:8080` as fallback
///
/// A trailing `/` is stripped.
pub fn get_api_base() -> String {
    let base = std::env::var("THEORYGAP_API_BASE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    base.trim().trim_end_matches('/').to_string()
}

/// Bearer token forwarded to the analysis service, from `THEORYGAP_API_TOKEN`.
pub fn get_api_token() -> Option<String> {
    std::env::var("THEORYGAP_API_TOKEN")
        .ok()
        .filter(|v| !v.is_empty())
}

/// Engine executable from `THEORYGAP_ENGINE_PATH`. When unset the engine is
/// searched for in the usual install locations.
pub fn get_engine_path() -> Option<PathBuf> {
    std::env::var_os("THEORYGAP_ENGINE_PATH")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Directory for rolling log files, from `THEORYGAP_LOG_DIR`. Logs go to
/// stderr when unset.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var_os("THEORYGAP_LOG_DIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Get the job poll interval.
///
/// Priority:
/// 1. `THEORYGAP_POLL_INTERVAL_MS` env variable if set (falls back to default
///    if the value cannot be parsed as a positive `u64`)
/// 2. `1500` ms as fallback
pub fn get_poll_interval() -> Duration {
    let ms = std::env::var("THEORYGAP_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    Duration::from_millis(ms)
}
