//! # Bridge Telemetry
//!
//! Observability bootstrap shared by the bridge binaries.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter` and a
//!   pretty or JSON fmt layer.
//! - **Metrics**: Prometheus text rendering of the default registry, which
//!   is where `bridge-validator` registers its collectors.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SB_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `SB_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `SB_SERVICE_NAME` | `subnet-bridge` | Service name in build info |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{gather_metrics, register_build_info, BUILD_INFO};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    /// The log level filter could not be parsed.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Filter as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Prometheus registration or encoding failed.
    #[error("Metrics error: {0}")]
    Metrics(String),
}
