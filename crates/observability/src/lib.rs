//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use tracing::LogFormat;

/// Initialize tracing with the format named by `LOG_FORMAT` (JSON unless set
/// to `pretty`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let format = std::env::var("LOG_FORMAT")
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    tracing::init(format);
}
