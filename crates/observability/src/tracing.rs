//! JSON log output filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Fallback directive when `RUST_LOG` is unset: info overall, debug for the stock ledger.
pub const DEFAULT_FILTER: &str = "info,kardexpos_infra=debug";

pub fn init() {
    let _ = try_init(DEFAULT_FILTER);
}

/// Install the global subscriber. Returns `false` if one was already installed.
pub fn try_init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // One JSON object per line; span fields carry product/sale ids.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init()
        .is_ok()
}
