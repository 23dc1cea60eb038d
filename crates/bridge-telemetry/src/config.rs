//! Telemetry configuration from environment variables.

use std::env;

/// Logging and metrics settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for logs and build info
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full directive
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format
    pub json_logs: bool,

    /// Include file and line in log lines
    pub with_source: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "subnet-bridge".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_source: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SB_SERVICE_NAME`: Service name (default: subnet-bridge)
    /// - `SB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `SB_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self::from_lookup(|key| env::var(key).ok(), is_container)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, json_by_default: bool) -> Self {
        let json_logs = lookup("SB_JSON_LOGS")
            .map(|v| parse_flag(&v))
            .unwrap_or(json_by_default);

        Self {
            service_name: lookup("SB_SERVICE_NAME").unwrap_or_else(|| "subnet-bridge".to_string()),
            log_level: lookup("SB_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
            json_logs,
            with_source: json_logs,
        }
    }
}

/// `true`/`1`/`yes` (any case) are on; everything else is off.
pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
