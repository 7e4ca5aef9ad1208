//! Common types for metrics collection

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Metric families hosted by one registry
///
/// Each kind owns a name prefix so the four families can share a single
/// engine without colliding. The prefix is removed again on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically increasing value
    Counter,
    /// Point-in-time value computed by a collector at export time
    Gauge,
    /// Distribution of observed values
    Histogram,
    /// Distribution of observed durations in seconds
    Timer,
}

impl MetricKind {
    /// All kinds, in export section order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Counter,
        MetricKind::Gauge,
        MetricKind::Timer,
        MetricKind::Histogram,
    ];

    /// Internal name prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter_",
            MetricKind::Gauge => "gauge_",
            MetricKind::Histogram => "histogram_",
            MetricKind::Timer => "timer_",
        }
    }

    /// Compose the engine name for a logical (already project-prefixed) name
    pub fn metric_name(&self, logical: &str) -> String {
        format!("{}{}", self.prefix(), logical)
    }

    /// Split an engine name into its kind and exported name
    pub fn classify(name: &str) -> Option<(MetricKind, &str)> {
        Self::ALL
            .iter()
            .find_map(|kind| name.strip_prefix(kind.prefix()).map(|rest| (*kind, rest)))
    }
}

/// Aging parameters for timers and histograms
///
/// Without `max_age_seconds` the distribution is cumulative for the lifetime
/// of the metric. With it, quantiles cover a sliding window made of
/// `age_buckets` rotating sketches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Width of the sliding window in seconds
    pub max_age_seconds: Option<u64>,

    /// Number of rotating buckets inside the window (default 5)
    pub age_buckets: Option<u32>,

    /// Drop all samples once the window holds no observations
    pub prune_aged_buckets: bool,
}

impl SummaryConfig {
    /// Bucket count used when a window is configured without one
    pub const DEFAULT_AGE_BUCKETS: u32 = 5;

    /// Sliding window of `max_age_seconds` with the default bucket count
    pub fn windowed(max_age_seconds: u64) -> Self {
        Self {
            max_age_seconds: Some(max_age_seconds),
            ..Default::default()
        }
    }

    /// Set the number of rotating buckets
    pub fn with_age_buckets(mut self, age_buckets: u32) -> Self {
        self.age_buckets = Some(age_buckets);
        self
    }

    /// Enable or disable pruning of an empty window
    pub fn with_prune_aged_buckets(mut self, prune: bool) -> Self {
        self.prune_aged_buckets = prune;
        self
    }

    /// Effective bucket count, at least one
    pub fn effective_age_buckets(&self) -> u32 {
        match self.max_age_seconds {
            Some(_) => self
                .age_buckets
                .unwrap_or(Self::DEFAULT_AGE_BUCKETS)
                .max(1),
            None => 1,
        }
    }
}

/// Configuration for a metrics registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Project name prepended to every metric created by the registry
    pub project_name: Option<String>,

    /// Labels attached to every exported sample
    pub static_labels: BTreeMap<String, String>,

    /// Aging parameters used by `timer` and `histogram`
    pub default_summary: SummaryConfig,

    /// Console report period, when a reporter is wanted
    pub report_interval_secs: Option<u64>,
}

impl MetricsConfig {
    /// Create config with a project name
    pub fn with_project_name(project_name: impl Into<String>) -> Self {
        Self {
            project_name: Some(project_name.into()),
            ..Default::default()
        }
    }

    /// Add a static label
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_labels.insert(name.into(), value.into());
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_prefixes() {
        assert_eq!(MetricKind::Counter.prefix(), "counter_");
        assert_eq!(MetricKind::Gauge.prefix(), "gauge_");
        assert_eq!(MetricKind::Histogram.prefix(), "histogram_");
        assert_eq!(MetricKind::Timer.prefix(), "timer_");
        assert_eq!(MetricKind::Timer.metric_name("svc_op"), "timer_svc_op");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            MetricKind::classify("counter_svc_requests"),
            Some((MetricKind::Counter, "svc_requests"))
        );
        assert_eq!(
            MetricKind::classify("histogram_size"),
            Some((MetricKind::Histogram, "size"))
        );
        assert_eq!(MetricKind::classify("process_cpu_seconds_total"), None);
    }

    #[test]
    fn test_summary_config_buckets() {
        assert_eq!(SummaryConfig::default().effective_age_buckets(), 1);
        assert_eq!(SummaryConfig::windowed(60).effective_age_buckets(), 5);
        assert_eq!(
            SummaryConfig::windowed(60).with_age_buckets(0).effective_age_buckets(),
            1
        );
        assert!(!SummaryConfig::windowed(60).prune_aged_buckets);
    }

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.project_name.is_none());
        assert!(config.static_labels.is_empty());
        assert_eq!(config.default_summary, SummaryConfig::default());
        assert!(config.report_interval_secs.is_none());
    }

    #[test]
    fn test_metrics_config_from_toml() {
        let config = MetricsConfig::from_toml_str(
            r#"
            project_name = "svc"
            report_interval_secs = 30

            [static_labels]
            env = "prod"

            [default_summary]
            max_age_seconds = 600
            age_buckets = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.project_name.as_deref(), Some("svc"));
        assert_eq!(config.report_interval_secs, Some(30));
        assert_eq!(config.static_labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(config.default_summary.max_age_seconds, Some(600));
        assert_eq!(config.default_summary.effective_age_buckets(), 10);
        assert!(!config.default_summary.prune_aged_buckets);
    }

    #[test]
    fn test_metrics_config_rejects_bad_toml() {
        assert!(MetricsConfig::from_toml_str("project_name = [").is_err());
    }

    #[test]
    fn test_metrics_config_builder() {
        let config = MetricsConfig::with_project_name("svc").with_label("region", "eu");
        assert_eq!(config.project_name.as_deref(), Some("svc"));
        assert_eq!(config.static_labels.len(), 1);
    }
}
