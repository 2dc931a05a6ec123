#![forbid(unsafe_code)]

//! Tracing integration.
//!
//! With the `tracing` feature the usual macros are re-exported so dependent
//! crates can log through `panelgrid_core::{debug, info, ...}`. The
//! `tracing-json` feature adds [`init_json_logging`] for hosts that want
//! structured JSON lines on stderr.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "panelgrid_layout=info,panelgrid_core=info";

/// Install a global JSON subscriber.
///
/// `RUST_LOG` wins over `default_filter` when present. Fails if a global
/// subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging(
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
}
