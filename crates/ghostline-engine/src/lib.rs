//! Ghostline Engine — inline completion core (cache, classifier, matchup,
//! postprocessing, prediction lifecycle).

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod matchup;
pub mod postprocess;
pub mod prediction;

pub use config::{Config, EngineConfig};
pub use engine::CompletionEngine;

/// Initialize tracing subscriber.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
