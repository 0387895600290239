//! Tracing and logging setup shared by storefront binaries.

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize process-wide structured logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init_with(DEFAULT_FILTER);
}

/// Subscriber configuration (filters, JSON formatting).
pub mod tracing;
