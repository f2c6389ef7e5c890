//! Tracing subscriber setup for binaries embedding the engine.
//!
//! The library itself only emits `tracing` events; installing a
//! subscriber is left to the host process. `RUST_LOG` overrides the
//! configured level when set.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to output
    pub level: Level,
    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,
    /// Show target/module name
    pub show_target: bool,
    /// Enable colored output
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_target: false,
            color: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose plain-text output, for tests and debugging sessions.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            show_target: true,
            color: false,
        }
    }

    /// Machine-readable output; audit events carry all fields.
    pub fn json() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            show_target: true,
            color: false,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("herenow={}", self.level)))
    }
}

/// Install a global subscriber.
///
/// Returns an error if a global subscriber has already been set.
pub fn init_logging(config: LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = Registry::default().with(config.env_filter());

    if config.json_format {
        registry
            .with(fmt::layer().json().with_target(config.show_target))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(config.show_target)
                    .with_ansi(config.color),
            )
            .try_init()
    }
}
