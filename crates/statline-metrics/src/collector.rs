//! Gauge collectors and foreign Prometheus collectors
//!
//! Gauges are not observed directly: a collector closure is registered once
//! and evaluated on every export cycle. Foreign collectors are arbitrary
//! `prometheus` collectors exported next to the registry's own metrics.

use prometheus::{core::Collector, proto::MetricFamily};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Value produced by a gauge collector
///
/// JSON writes NaN as `null`; reading `null` back yields NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GaugeReading {
    /// Numeric reading; NaN counts as non-numeric
    Number(#[serde(deserialize_with = "number_or_nan")] f64),
    /// Descriptive reading, reported as is
    Text(String),
}

fn number_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl GaugeReading {
    /// Numeric value, if the reading is a number other than NaN
    pub fn as_number(&self) -> Option<f64> {
        match self {
            GaugeReading::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Whether the reading can be stored in the engine
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }
}

impl fmt::Display for GaugeReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeReading::Number(v) if v.is_nan() => write!(f, "NaN"),
            GaugeReading::Number(v) => write!(f, "{}", v),
            GaugeReading::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for GaugeReading {
    fn from(value: f64) -> Self {
        GaugeReading::Number(value)
    }
}

impl From<f32> for GaugeReading {
    fn from(value: f32) -> Self {
        GaugeReading::Number(f64::from(value))
    }
}

macro_rules! gauge_reading_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for GaugeReading {
                fn from(value: $t) -> Self {
                    GaugeReading::Number(value as f64)
                }
            }
        )*
    };
}

gauge_reading_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<String> for GaugeReading {
    fn from(value: String) -> Self {
        GaugeReading::Text(value)
    }
}

impl From<&str> for GaugeReading {
    fn from(value: &str) -> Self {
        GaugeReading::Text(value.to_string())
    }
}

impl From<Option<f64>> for GaugeReading {
    fn from(value: Option<f64>) -> Self {
        GaugeReading::Number(value.unwrap_or(f64::NAN))
    }
}

/// Deferred value source for a gauge
pub type GaugeCollector = Arc<dyn Fn() -> anyhow::Result<GaugeReading> + Send + Sync>;

/// Adapt an infallible closure into a gauge collector
pub(crate) fn infallible<F, T>(f: F) -> GaugeCollector
where
    F: Fn() -> T + Send + Sync + 'static,
    T: Into<GaugeReading>,
{
    Arc::new(move || Ok(f().into()))
}

/// Adapt a fallible closure into a gauge collector
pub(crate) fn fallible<F, T, E>(f: F) -> GaugeCollector
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Into<GaugeReading>,
    E: Into<anyhow::Error>,
{
    Arc::new(move || f().map(Into::into).map_err(Into::into))
}

/// Shared handle to a Prometheus collector
///
/// The registry builds a fresh Prometheus registry on every export, so the
/// same collector is registered many times through this cheap clone.
#[derive(Clone)]
pub(crate) struct SharedCollector {
    inner: Arc<dyn Collector>,
}

impl SharedCollector {
    pub(crate) fn new(collector: Box<dyn Collector>) -> Self {
        Self {
            inner: Arc::from(collector),
        }
    }

    pub(crate) fn from_arc(inner: Arc<dyn Collector>) -> Self {
        Self { inner }
    }

    /// Fully qualified names of every family this collector describes
    pub(crate) fn family_names(&self) -> Vec<String> {
        self.inner
            .desc()
            .iter()
            .map(|desc| desc.fq_name.clone())
            .collect()
    }
}

impl Collector for SharedCollector {
    fn desc(&self) -> Vec<&prometheus::core::Desc> {
        self.inner.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let families = self.inner.collect();
        debug!("Collected {} metric families", families.len());
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Opts};

    #[test]
    fn test_reading_numeric() {
        assert_eq!(GaugeReading::from(3u32).as_number(), Some(3.0));
        assert_eq!(GaugeReading::from(-1.5).as_number(), Some(-1.5));
        assert!(!GaugeReading::from(f64::NAN).is_numeric());
        assert!(!GaugeReading::from(None::<f64>).is_numeric());
        assert!(!GaugeReading::from("warming up").is_numeric());
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(GaugeReading::from(f64::NAN).to_string(), "NaN");
        assert_eq!(GaugeReading::from("idle").to_string(), "idle");
        assert_eq!(GaugeReading::from(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_reading_serializes_untagged() {
        assert_eq!(serde_json::to_string(&GaugeReading::from(4u8)).unwrap(), "4.0");
        assert_eq!(
            serde_json::to_string(&GaugeReading::from("up")).unwrap(),
            "\"up\""
        );
    }

    #[test]
    fn test_reading_deserializes_null_as_nan() {
        let reading: GaugeReading = serde_json::from_str("null").unwrap();
        assert!(matches!(reading, GaugeReading::Number(v) if v.is_nan()));

        let reading: GaugeReading = serde_json::from_str("2.5").unwrap();
        assert_eq!(reading, GaugeReading::Number(2.5));

        let reading: GaugeReading = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(reading, GaugeReading::Text("idle".to_string()));
    }

    #[test]
    fn test_collector_adapters() {
        let ok = infallible(|| 7u64);
        assert_eq!(ok().unwrap(), GaugeReading::Number(7.0));

        let failing = fallible(|| -> Result<f64, std::io::Error> {
            Err(std::io::Error::other("gone"))
        });
        assert!(failing().is_err());
    }

    #[test]
    fn test_shared_collector_forwards() {
        let counter = IntCounter::with_opts(Opts::new("legacy_requests_total", "legacy")).unwrap();
        counter.inc_by(3);

        let foreign = SharedCollector::new(Box::new(counter));
        assert_eq!(foreign.family_names(), vec!["legacy_requests_total".to_string()]);

        let families = foreign.collect();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 3.0);
    }
}
