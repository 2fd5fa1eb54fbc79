//! stderr logging setup
//!
//! RUST_LOG wins when set. Otherwise the config level applies, raised by
//! each -v.

use tracing_subscriber::EnvFilter;

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Effective level for a configured level and a -v count
pub fn effective_level(configured: &str, verbose: u8) -> &'static str {
    let base = LEVELS
        .iter()
        .position(|level| level.eq_ignore_ascii_case(configured.trim()))
        .unwrap_or(1);
    let raised = base.saturating_add(usize::from(verbose)).min(LEVELS.len() - 1);
    LEVELS[raised]
}

pub fn init(configured: &str, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(configured, verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
