pub mod ai; // Completion service boundary (trait + HTTP client + mock)
pub mod config;
pub mod curation; // Diagnosis list curation (principal, selection, reorder)
pub mod history; // Persistent analysis history (SQLite + live view + import/export)
pub mod ingestion; // File upload → clinical text
pub mod models;
pub mod orchestrator; // Concurrent concept/diagnosis calls + joint retry
pub mod retry; // Transient-error classifier + bounded retry driver
pub mod session; // Form-scoped case state

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the
/// default filter from [`config::default_log_filter`].
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Codalis core starting v{}", config::APP_VERSION);
}
