//! Logging setup for the mentor binaries, plus an in-memory capture layer
//! for asserting on log output in tests.
//!
//! ```rust,ignore
//! mentor_telemetry::init_telemetry("mentor", false)?;
//! tracing::info!(parents = 12, "memory restored");
//! ```
//!
//! The filter comes from `RUST_LOG` and defaults to `info`.

mod capture;

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use capture::{CaptureLayer, CapturedEvent, CapturedEvents};

static INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install global subscriber: {0}")]
    Init(String),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to stderr.
///
/// `json` selects newline-delimited JSON output instead of the human-readable
/// format. Calling this more than once is a no-op.
pub fn init_telemetry(service_name: &str, json: bool) -> Result<(), TelemetryError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr)))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    let _ = INITIALIZED.set(());
    tracing::info!(service = service_name, json, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_init_is_a_no_op() {
        init_telemetry("test-service", true).unwrap();
        init_telemetry("test-service", false).unwrap();
        assert!(INITIALIZED.get().is_some());
    }
}
