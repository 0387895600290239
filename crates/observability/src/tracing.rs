//! JSON log subscriber.
//!
//! One event per line with timestamp, level, fields and the enclosing span
//! (store methods carry `#[instrument]` spans, so an event logged inside
//! `record_stock_entry` shows its `product_id` without repeating it).

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` if set and valid, else `default_directives`.
pub fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init_with(default_directives: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directives))
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}
