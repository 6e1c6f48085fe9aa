//! Tracing subscriber setup.

use crate::LoggingConfig;
use picstash_error::{ConfigError, PicstashResult};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails instead of
/// panicking when a global subscriber is already set.
///
/// # Example
///
/// ```no_run
/// use picstash::{LoggingConfig, init_tracing};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// init_tracing(&LoggingConfig::default())?;
/// tracing::info!("picstash starting");
/// # Ok(())
/// # }
/// ```
pub fn init_tracing(config: &LoggingConfig) -> PicstashResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::new(format!("Invalid log filter '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        ConfigError::new(format!("Failed to install tracing subscriber: {}", e)).into()
    })
}
