//! Process-wide tracing setup.
//!
//! Components never read global switches: each buffer pool and tree owns a span
//! created at construction and emits its events under it. This function only
//! decides, once at startup, where those events go.

use tracing_subscriber::{fmt, EnvFilter};

use super::error::{Result, StratumError};

/// Installs a formatting subscriber filtered by `level` (any `EnvFilter`
/// directive, e.g. `"info"` or `"stratum::buffer=trace"`).
///
/// Fails if the directive does not parse or a global subscriber already exists.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| StratumError::Logging(format!("invalid log level {level:?}: {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| StratumError::Logging("logging already initialized".into()))
}
