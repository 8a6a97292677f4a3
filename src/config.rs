//! Application-level constants and externally tunable settings.
//!
//! Retry delay schedules are deliberately not hard-wired: both the file
//! ingestion schedule and the suggestion orchestration schedule can be
//! overridden through environment variables (comma-separated millisecond
//! values) so deployments can tune them without a rebuild.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetrySchedule;

/// Application-level constants
pub const APP_NAME: &str = "Codalis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var overriding the file-ingestion retry delays (ms, comma-separated).
pub const INGESTION_DELAYS_ENV: &str = "CODALIS_INGESTION_DELAYS_MS";
/// Env var overriding the suggestion-orchestration retry delays (ms, comma-separated).
pub const SUGGESTION_DELAYS_ENV: &str = "CODALIS_SUGGESTION_DELAYS_MS";

/// Default delays before ingestion retry attempts 2..=4.
const DEFAULT_INGESTION_DELAYS_MS: [u64; 3] = [2_000, 4_000, 8_000];
/// Default delays before suggestion retry attempts 2..=4.
const DEFAULT_SUGGESTION_DELAYS_MS: [u64; 3] = [2_500, 5_000, 10_000];

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Codalis/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Codalis")
}

/// Path of the analysis history database.
pub fn history_db_path() -> PathBuf {
    app_data_dir().join("history.db")
}

/// Retry schedule for document ingestion (3 delays = 4 total attempts by default).
pub fn ingestion_schedule() -> RetrySchedule {
    schedule_from_env(INGESTION_DELAYS_ENV, &DEFAULT_INGESTION_DELAYS_MS)
}

/// Retry schedule for suggestion orchestration (3 delays = 4 total attempts by default).
pub fn suggestion_schedule() -> RetrySchedule {
    schedule_from_env(SUGGESTION_DELAYS_ENV, &DEFAULT_SUGGESTION_DELAYS_MS)
}

fn schedule_from_env(var: &str, defaults: &[u64]) -> RetrySchedule {
    match std::env::var(var) {
        Ok(raw) => match parse_delays_ms(&raw) {
            Some(delays) => RetrySchedule::new(delays),
            None => {
                tracing::warn!(var, value = %raw, "Ignoring malformed delay override");
                RetrySchedule::from_millis(defaults)
            }
        },
        Err(_) => RetrySchedule::from_millis(defaults),
    }
}

/// Parse `"2000,4000,8000"` into delay durations. Empty or malformed → None.
fn parse_delays_ms(raw: &str) -> Option<Vec<Duration>> {
    let delays: Vec<Duration> = raw
        .split(',')
        .map(|part| part.trim().parse::<u64>().map(Duration::from_millis))
        .collect::<Result<_, _>>()
        .ok()?;
    if delays.is_empty() {
        return None;
    }
    Some(delays)
}
