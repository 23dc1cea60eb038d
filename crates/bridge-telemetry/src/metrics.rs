//! Prometheus text export.
//!
//! Collectors are registered by the crates that own them (see
//! `bridge_validator::metrics`) on the default registry; this module only
//! renders it.

use lazy_static::lazy_static;
use prometheus::{register_int_gauge_vec, Encoder, IntGaugeVec, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Constant 1, labeled with service name and version
    pub static ref BUILD_INFO: IntGaugeVec = register_int_gauge_vec!(
        "bridge_build_info",
        "Build information of the running bridge",
        &["service", "version"]
    )
    .expect("Failed to create BUILD_INFO metric");
}

/// Publish the build info gauge.
pub fn register_build_info(service: &str) {
    BUILD_INFO
        .with_label_values(&[service, env!("CARGO_PKG_VERSION")])
        .set(1);
}

/// Encode the default registry in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
