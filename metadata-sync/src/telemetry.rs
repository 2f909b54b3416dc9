//! Tracing subscriber setup.

use std::env;

use tracing_subscriber::EnvFilter;

use crate::SyncServiceError;

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` (default `info`). `LOG_FORMAT=json`
/// switches to one JSON object per line.
pub fn init_tracing() -> Result<(), SyncServiceError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| SyncServiceError::config(format!("Failed to initialize tracing: {}", e)))
}
