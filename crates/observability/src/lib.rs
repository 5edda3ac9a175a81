//! Process-wide logging setup shared by binaries.

/// Initialize tracing for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (filter + JSON formatter).
pub mod tracing;
