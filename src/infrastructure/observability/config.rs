//! Observability configuration

use serde::Deserialize;

/// `[observability]` section: trace export and the Prometheus endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub tracing: TracingConfig,
    pub metrics: MetricsConfig,
}

/// OTLP trace export; local log output is configured under `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    /// gRPC collector endpoint
    pub otlp_endpoint: String,
    pub service_name: String,
    /// Fraction of root traces exported, clamped to `0.0..=1.0`
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: "access-gate".to_string(),
            sampling_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    pub fn effective_sampling_ratio(&self) -> f64 {
        if self.sampling_ratio.is_nan() {
            return 1.0;
        }
        self.sampling_ratio.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route the Prometheus scrape endpoint is mounted on
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ObservabilityConfig::default();

        assert!(!config.tracing.enabled);
        assert_eq!(config.tracing.service_name, "access-gate");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ObservabilityConfig = serde_json::from_value(serde_json::json!({
            "tracing": { "enabled": true, "sampling_ratio": 0.25 },
            "metrics": { "path": "/internal/metrics" }
        }))
        .unwrap();

        assert!(config.tracing.enabled);
        assert_eq!(config.tracing.effective_sampling_ratio(), 0.25);
        assert_eq!(config.tracing.otlp_endpoint, "http://localhost:4317");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.path, "/internal/metrics");
    }

    #[test]
    fn test_sampling_ratio_is_clamped() {
        let mut config = TracingConfig {
            sampling_ratio: 4.0,
            ..Default::default()
        };
        assert_eq!(config.effective_sampling_ratio(), 1.0);

        config.sampling_ratio = -1.0;
        assert_eq!(config.effective_sampling_ratio(), 0.0);

        config.sampling_ratio = f64::NAN;
        assert_eq!(config.effective_sampling_ratio(), 1.0);
    }
}
