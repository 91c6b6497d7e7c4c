//! Process-wide logging setup shared by the binaries.

/// Initialize structured logging. Subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
