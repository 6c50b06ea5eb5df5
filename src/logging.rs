use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ShellError;

/// Installs the global stderr subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `level` (e.g. `info`, `debug`)
/// applies to every target.
pub fn init_logging(level: &str) -> Result<(), ShellError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ShellError::Logging(e.to_string()))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| ShellError::Logging(e.to_string()))
}
