// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Metrics registry: get-or-create handles, labels, prefixing and gauge flushing

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::{proto::MetricFamily, Counter, Gauge, Opts, Registry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::collector::{self, GaugeCollector, GaugeReading, SharedCollector};
use crate::error::{MetricsError, Result};
use crate::summary::SummaryMetric;
use crate::timer::{Histogram, Timer};
use crate::types::{MetricKind, MetricsConfig, SummaryConfig};

/// Metric instance owned by the registry
#[derive(Clone)]
pub(crate) enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Arc<SummaryMetric>),
    Timer(Arc<SummaryMetric>),
}

impl Metric {
    #[cfg(test)]
    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }

    fn collector(&self) -> Box<dyn Collector> {
        match self {
            Metric::Counter(c) => Box::new(c.clone()),
            Metric::Gauge(g) => Box::new(g.clone()),
            Metric::Histogram(s) | Metric::Timer(s) => {
                let shared: Arc<dyn Collector> = Arc::<SummaryMetric>::clone(s);
                Box::new(SharedCollector::from_arc(shared))
            }
        }
    }
}

/// Central metrics registry
///
/// Cheap to clone; clones share state. Every metric lives under
/// `<kind prefix><project prefix><logical name>` and is created on first
/// access. Independent registries do not see each other's metrics.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

#[derive(Default)]
struct RegistryState {
    /// Project prefix, `"<name>_"` or empty
    prefix: String,
    /// Labels attached to every exported sample
    labels: BTreeMap<String, String>,
    /// Deferred gauge sources keyed by prefixed logical name
    gauges: BTreeMap<String, GaugeCollector>,
    /// Engine metrics keyed by full metric name
    metrics: BTreeMap<String, Metric>,
    /// Collectors registered from outside
    foreign: Vec<SharedCollector>,
    /// Aging parameters for `timer` and `histogram`
    default_summary: SummaryConfig,
}

impl RegistryState {
    fn logical_name(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(MetricsError::InvalidName(name.to_string()));
        }
        Ok(format!("{}{}", self.prefix, name))
    }

    fn foreign_names(&self) -> impl Iterator<Item = String> + '_ {
        self.foreign.iter().flat_map(SharedCollector::family_names)
    }
}

/// Label names reserved by the summary family
const RESERVED_LABELS: [&str; 1] = ["quantile"];

/// Check a label name against `[a-zA-Z_][a-zA-Z0-9_]*`
///
/// Names starting with `__` and the labels summaries emit themselves are
/// rejected as well.
fn validate_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if !valid || name.starts_with("__") || RESERVED_LABELS.contains(&name) {
        warn!(label = %name, "Rejected label name");
        return Err(MetricsError::InvalidLabel(name.to_string()));
    }
    Ok(())
}

impl MetricsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from configuration
    ///
    /// Fails when a static label name is invalid.
    pub fn from_config(config: &MetricsConfig) -> Result<Self> {
        for name in config.static_labels.keys() {
            validate_label_name(name)?;
        }

        let registry = Self::new();
        {
            let mut state = registry.inner.lock();
            if let Some(project) = &config.project_name {
                state.prefix = format!("{}_", project);
            }
            state.labels = config.static_labels.clone();
            state.default_summary = config.default_summary.clone();
        }
        Ok(registry)
    }

    /// Prefix every metric created from now on with `<name>_`
    ///
    /// Metrics that already exist keep their names.
    pub fn set_project_name(&self, name: &str) {
        self.inner.lock().prefix = format!("{}_", name);
    }

    /// Current project prefix, empty when unset
    pub fn project_prefix(&self) -> String {
        self.inner.lock().prefix.clone()
    }

    /// Replace the labels attached to every exported sample
    ///
    /// Nothing changes when any of the names is invalid.
    pub fn set_static_labels<I, K, V>(&self, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let labels: BTreeMap<String, String> = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for name in labels.keys() {
            validate_label_name(name)?;
        }

        self.inner.lock().labels = labels;
        Ok(())
    }

    /// Set a single label, overwriting an existing value
    pub fn label(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_label_name(&name)?;
        self.inner.lock().labels.insert(name, value.into());
        Ok(())
    }

    /// Current labels
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.inner.lock().labels.clone()
    }

    /// Get or create the counter `name`
    pub fn counter(&self, name: &str) -> Result<Counter> {
        let mut state = self.inner.lock();
        let logical = state.logical_name(name)?;
        let metric_name = MetricKind::Counter.metric_name(&logical);

        if let Some(Metric::Counter(existing)) = state.metrics.get(&metric_name) {
            return Ok(existing.clone());
        }

        let counter = Counter::with_opts(Opts::new(metric_name.clone(), logical))?;
        debug!(metric = %metric_name, "Created counter");
        state
            .metrics
            .insert(metric_name, Metric::Counter(counter.clone()));
        Ok(counter)
    }

    /// Get or create the histogram `name` with the registry's default aging
    pub fn histogram(&self, name: &str) -> Result<Histogram> {
        let config = self.inner.lock().default_summary.clone();
        self.histogram_with(name, config)
    }

    /// Get or create the histogram `name`
    ///
    /// `config` only applies when the histogram is created by this call.
    pub fn histogram_with(&self, name: &str, config: SummaryConfig) -> Result<Histogram> {
        self.summary(MetricKind::Histogram, name, config)
            .map(Histogram::new)
    }

    /// Get or create the timer `name` with the registry's default aging
    pub fn timer(&self, name: &str) -> Result<Timer> {
        let config = self.inner.lock().default_summary.clone();
        self.timer_with(name, config)
    }

    /// Get or create the timer `name`
    ///
    /// `config` only applies when the timer is created by this call.
    pub fn timer_with(&self, name: &str, config: SummaryConfig) -> Result<Timer> {
        self.summary(MetricKind::Timer, name, config).map(Timer::new)
    }

    fn summary(
        &self,
        kind: MetricKind,
        name: &str,
        config: SummaryConfig,
    ) -> Result<Arc<SummaryMetric>> {
        let mut state = self.inner.lock();
        let logical = state.logical_name(name)?;
        let metric_name = kind.metric_name(&logical);

        match state.metrics.get(&metric_name) {
            Some(Metric::Histogram(existing)) | Some(Metric::Timer(existing)) => {
                if existing.config() != &config {
                    debug!(metric = %metric_name, "Metric exists, ignoring new aging configuration");
                }
                return Ok(Arc::clone(existing));
            }
            _ => {}
        }

        let summary = Arc::new(SummaryMetric::new(&metric_name, &logical, config)?);
        let metric = match kind {
            MetricKind::Timer => Metric::Timer(Arc::clone(&summary)),
            _ => Metric::Histogram(Arc::clone(&summary)),
        };
        debug!(metric = %metric_name, "Created summary");
        state.metrics.insert(metric_name, metric);
        Ok(summary)
    }

    /// Register a gauge evaluated by `collector` on every export
    ///
    /// Returns `Ok(false)` when a collector already exists under that name;
    /// the first registration wins and `collector` is dropped unused. The
    /// name is validated here so a later export cannot fail on it.
    pub fn gauge<F, T>(&self, name: &str, collector: F) -> Result<bool>
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<GaugeReading>,
    {
        self.register_gauge(name, collector::infallible(collector))
    }

    /// Register a gauge whose collector may fail
    ///
    /// A failure aborts the export that triggered the flush.
    pub fn try_gauge<F, T, E>(&self, name: &str, collector: F) -> Result<bool>
    where
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Into<GaugeReading>,
        E: Into<anyhow::Error>,
    {
        self.register_gauge(name, collector::fallible(collector))
    }

    fn register_gauge(&self, name: &str, collector: GaugeCollector) -> Result<bool> {
        let mut state = self.inner.lock();
        let key = state.logical_name(name)?;
        if state.gauges.contains_key(&key) {
            debug!(gauge = %key, "Gauge already registered");
            return Ok(false);
        }

        Desc::new(
            MetricKind::Gauge.metric_name(&key),
            key.clone(),
            Vec::new(),
            HashMap::new(),
        )?;
        state.gauges.insert(key, collector);
        Ok(true)
    }

    /// Attach a foreign Prometheus collector
    ///
    /// Its families are exported as they are and reported under `unknown`
    /// in the JSON summary.
    pub fn register_collector(&self, collector: Box<dyn Collector>) -> Result<()> {
        let collector = SharedCollector::new(collector);
        let mut state = self.inner.lock();

        for name in collector.family_names() {
            let taken = state.metrics.contains_key(&name)
                || state.foreign_names().any(|existing| existing == name);
            if taken {
                return Err(MetricsError::AlreadyRegistered(name));
            }
        }

        state.foreign.push(collector);
        Ok(())
    }

    /// Export CPU, memory and file descriptor metrics of this process
    #[cfg(all(feature = "process", target_os = "linux"))]
    pub fn register_process_metrics(&self) -> Result<()> {
        self.register_collector(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))
    }

    /// Drop every metric, gauge collector, label and the project prefix
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        let default_summary = std::mem::take(&mut state.default_summary);
        *state = RegistryState {
            default_summary,
            ..Default::default()
        };
        debug!("Metrics registry cleared");
    }

    /// Number of live engine metrics
    pub fn len(&self) -> usize {
        self.inner.lock().metrics.len()
    }

    /// Whether the engine holds no metrics
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate every gauge collector and store numeric readings
    ///
    /// Non-numeric readings (text or NaN) keep whatever the gauge held
    /// before. Collectors run without the registry lock held. Returns the
    /// readings of this cycle keyed by gauge name.
    pub fn flush_gauges(&self) -> Result<BTreeMap<String, GaugeReading>> {
        let collectors: Vec<(String, GaugeCollector)> = self
            .inner
            .lock()
            .gauges
            .iter()
            .map(|(name, collector)| (name.clone(), Arc::clone(collector)))
            .collect();

        let mut readings = BTreeMap::new();
        for (name, collector) in collectors {
            let reading = collector().map_err(|e| MetricsError::collector(name.clone(), e))?;
            readings.insert(name, reading);
        }

        let mut state = self.inner.lock();
        for (name, reading) in &readings {
            let Some(value) = reading.as_number() else {
                debug!(gauge = %name, "Skipping non-numeric gauge reading");
                continue;
            };

            let metric_name = MetricKind::Gauge.metric_name(name);
            if let Some(Metric::Gauge(gauge)) = state.metrics.get(&metric_name) {
                gauge.set(value);
                continue;
            }

            let gauge = Gauge::with_opts(Opts::new(metric_name.clone(), name.clone()))?;
            gauge.set(value);
            debug!(metric = %metric_name, "Created gauge");
            state.metrics.insert(metric_name, Metric::Gauge(gauge));
        }

        Ok(readings)
    }

    /// Engine metrics ordered by full name
    pub(crate) fn entries(&self) -> Vec<(String, Metric)> {
        self.inner
            .lock()
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect()
    }

    /// Families of the foreign collectors, ordered by name
    pub(crate) fn foreign_families(&self) -> Vec<MetricFamily> {
        let foreign = self.inner.lock().foreign.clone();
        let mut families: Vec<MetricFamily> =
            foreign.iter().flat_map(|c| c.collect()).collect();
        families.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        families
    }

    /// Gather every family with the static labels applied
    pub(crate) fn gather(&self) -> Result<Vec<MetricFamily>> {
        let (labels, collectors) = {
            let state = self.inner.lock();
            let collectors: Vec<Box<dyn Collector>> = state
                .metrics
                .values()
                .map(Metric::collector)
                .chain(
                    state
                        .foreign
                        .iter()
                        .map(|c| Box::new(c.clone()) as Box<dyn Collector>),
                )
                .collect();
            (state.labels.clone(), collectors)
        };

        let const_labels: Option<HashMap<String, String>> = if labels.is_empty() {
            None
        } else {
            Some(labels.into_iter().collect())
        };

        let registry = Registry::new_custom(None, const_labels)?;
        for collector in collectors {
            registry.register(collector)?;
        }
        Ok(registry.gather())
    }
}
