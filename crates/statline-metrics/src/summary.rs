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
//! Quantile summaries backing timers and histograms
//!
//! Each summary keeps one DDSketch per age bucket. Observations go into every
//! bucket; on rotation the oldest bucket is reset and becomes the newest, so
//! the head bucket always covers at most `max_age_seconds` of data. Count and
//! sum stay cumulative, as the Prometheus summary type expects.

use metrics_util::storage::Summary as Sketch;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::types::SummaryConfig;

/// Quantiles exported for every timer and histogram
pub const QUANTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];

/// Quantile record of one timer or histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantileSummary {
    /// 50th percentile
    #[serde(rename = "50", skip_serializing_if = "Option::is_none", default)]
    pub p50: Option<f64>,
    /// 90th percentile
    #[serde(rename = "90", skip_serializing_if = "Option::is_none", default)]
    pub p90: Option<f64>,
    /// 95th percentile
    #[serde(rename = "95", skip_serializing_if = "Option::is_none", default)]
    pub p95: Option<f64>,
    /// 99th percentile
    #[serde(rename = "99", skip_serializing_if = "Option::is_none", default)]
    pub p99: Option<f64>,
    /// Observations recorded since creation
    pub count: u64,
}

impl QuantileSummary {
    /// Look up a quantile by value; only the exported set is known
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let values = [self.p50, self.p90, self.p95, self.p99];
        QUANTILES
            .iter()
            .position(|&known| known == q)
            .and_then(|i| values[i])
    }
}

struct Bucket {
    sketch: Sketch,
    observations: u64,
}

impl Bucket {
    fn new() -> Self {
        Self {
            sketch: Sketch::with_defaults(),
            observations: 0,
        }
    }
}

struct Window {
    buckets: Vec<Bucket>,
    head: usize,
    slot: Option<Duration>,
    rotated_at: Instant,
    count: u64,
    sum: f64,
}

impl Window {
    fn new(config: &SummaryConfig, now: Instant) -> Self {
        let n = config.effective_age_buckets();
        let slot = config
            .max_age_seconds
            .map(|secs| Duration::from_secs(secs.max(1)) / n);

        Self {
            buckets: (0..n).map(|_| Bucket::new()).collect(),
            head: 0,
            slot,
            rotated_at: now,
            count: 0,
            sum: 0.0,
        }
    }

    fn rotate(&mut self, now: Instant) {
        let Some(slot) = self.slot else {
            return;
        };
        if slot.is_zero() {
            return;
        }

        let elapsed = now.saturating_duration_since(self.rotated_at);
        let steps = (elapsed.as_nanos() / slot.as_nanos()) as u64;
        if steps == 0 {
            return;
        }

        let len = self.buckets.len();
        for _ in 0..steps.min(len as u64) {
            self.buckets[self.head] = Bucket::new();
            self.head = (self.head + 1) % len;
        }
        let advance = slot.saturating_mul(u32::try_from(steps).unwrap_or(u32::MAX));
        self.rotated_at = self
            .rotated_at
            .checked_add(advance)
            .unwrap_or(now);
    }

    fn observe(&mut self, value: f64, now: Instant) {
        self.rotate(now);
        for bucket in &mut self.buckets {
            bucket.sketch.add(value);
            bucket.observations += 1;
        }
        self.count += 1;
        self.sum += value;
    }

    fn head(&self) -> &Bucket {
        &self.buckets[self.head]
    }
}

/// Sliding-window quantile summary registered with the Prometheus engine
pub(crate) struct SummaryMetric {
    desc: Desc,
    config: SummaryConfig,
    window: Mutex<Window>,
}

impl SummaryMetric {
    /// Create a summary named `name`; the name is validated by the engine
    pub(crate) fn new(name: &str, help: &str, config: SummaryConfig) -> Result<Self> {
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            Vec::new(),
            HashMap::new(),
        )?;
        let window = Window::new(&config, Instant::now());

        Ok(Self {
            desc,
            config,
            window: Mutex::new(window),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.desc.fq_name
    }

    pub(crate) fn config(&self) -> &SummaryConfig {
        &self.config
    }

    pub(crate) fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    fn observe_at(&self, value: f64, now: Instant) {
        self.window.lock().observe(value, now);
    }

    pub(crate) fn snapshot(&self) -> QuantileSummary {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> QuantileSummary {
        let mut window = self.window.lock();
        window.rotate(now);
        let head = window.head();

        let mut summary = QuantileSummary {
            count: window.count,
            ..Default::default()
        };
        if head.observations > 0 {
            summary.p50 = head.sketch.quantile(0.5);
            summary.p90 = head.sketch.quantile(0.9);
            summary.p95 = head.sketch.quantile(0.95);
            summary.p99 = head.sketch.quantile(0.99);
        }
        summary
    }

    /// Whether the window is empty and pruning hides the metric
    fn pruned_at(&self, now: Instant) -> bool {
        if !self.config.prune_aged_buckets {
            return false;
        }
        let mut window = self.window.lock();
        window.rotate(now);
        window.head().observations == 0
    }

    fn family_at(&self, now: Instant) -> Option<MetricFamily> {
        if self.pruned_at(now) {
            return None;
        }

        let snapshot = self.snapshot_at(now);
        let sum = self.window.lock().sum;

        let quantiles: Vec<proto::Quantile> = QUANTILES
            .iter()
            .map(|&q| {
                let mut quantile = proto::Quantile::default();
                quantile.set_quantile(q);
                quantile.set_value(snapshot.quantile(q).unwrap_or(f64::NAN));
                quantile
            })
            .collect();

        let mut summary = proto::Summary::default();
        summary.set_sample_count(snapshot.count);
        summary.set_sample_sum(sum);
        summary.set_quantile(quantiles.into());

        let mut metric = proto::Metric::default();
        metric.set_summary(summary);

        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.set_metric(vec![metric].into());
        Some(family)
    }
}

impl Collector for SummaryMetric {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.family_at(Instant::now()).into_iter().collect()
    }
}
