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
//! Export of registry state
//!
//! Three renderings of the same state:
//!
//! - **Text exposition**: Prometheus text format with kind prefixes removed
//! - **JSON summary**: [`Snapshot`], grouped by metric kind
//! - **Console report**: aligned plain text for logs
//!
//! Every export flushes the gauge collectors first.

use prometheus::{proto::MetricFamily, Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

use crate::collector::GaugeReading;
use crate::error::Result;
use crate::registry::{Metric, MetricsRegistry};
use crate::summary::QuantileSummary;
use crate::types::MetricKind;

/// Current value of one metric, by kind
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Counter value
    Counter(f64),
    /// Gauge value or descriptive reading
    Gauge(GaugeReading),
    /// Timer quantiles, in seconds
    Timer(QuantileSummary),
    /// Histogram quantiles
    Histogram(QuantileSummary),
    /// Foreign family rendered as text exposition
    Unknown(String),
}

/// Point-in-time view of a registry, serializable to the JSON summary shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Counter values by exported name
    pub counters: BTreeMap<String, f64>,
    /// Gauge readings by exported name
    pub gauges: BTreeMap<String, GaugeReading>,
    /// Timer quantiles by exported name
    pub timers: BTreeMap<String, QuantileSummary>,
    /// Histogram quantiles by exported name
    pub histograms: BTreeMap<String, QuantileSummary>,
    /// Labels attached to every sample
    pub labels: BTreeMap<String, String>,
    /// Foreign families by name
    pub unknown: BTreeMap<String, String>,
}

impl Snapshot {
    /// Place a sample in the group of its kind
    pub fn insert(&mut self, name: impl Into<String>, sample: Sample) {
        let name = name.into();
        match sample {
            Sample::Counter(v) => {
                self.counters.insert(name, v);
            }
            Sample::Gauge(reading) => {
                self.gauges.insert(name, reading);
            }
            Sample::Timer(summary) => {
                self.timers.insert(name, summary);
            }
            Sample::Histogram(summary) => {
                self.histograms.insert(name, summary);
            }
            Sample::Unknown(text) => {
                self.unknown.insert(name, text);
            }
        }
    }

    /// Compact JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the console report
    pub fn render_console(&self) -> Result<String> {
        let width = self
            .labels
            .keys()
            .chain(self.counters.keys())
            .chain(self.timers.keys())
            .chain(self.histograms.keys())
            .chain(self.gauges.keys())
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            + 3;

        let mut msg = String::from("****** METRICS ******\n");

        if !self.labels.is_empty() {
            section(&mut msg, "Labels:", width);
            for (name, value) in &self.labels {
                entry(&mut msg, name, width, &serde_json::to_string(value)?);
            }
        }

        if !self.counters.is_empty() {
            section(&mut msg, "Counters:", width);
            for (name, value) in &self.counters {
                entry(&mut msg, name, width, &format!("{:>12}", format_number(*value)));
            }
        }

        if !self.gauges.is_empty() {
            section(&mut msg, "Gauges:", width);
            for (name, reading) in &self.gauges {
                let value = match reading.as_number() {
                    Some(v) => format!("{:>12}", format_number(v)),
                    None => reading.to_string(),
                };
                entry(&mut msg, name, width, &value);
            }
        }

        if !self.timers.is_empty() {
            section(&mut msg, "Timers:", width);
            for (name, summary) in &self.timers {
                entry(&mut msg, name, width, &serde_json::to_string(summary)?);
            }
        }

        if !self.histograms.is_empty() {
            section(&mut msg, "Histograms:", width);
            for (name, summary) in &self.histograms {
                entry(&mut msg, name, width, &serde_json::to_string(summary)?);
            }
        }

        Ok(msg.trim_end().to_string())
    }
}

fn section(msg: &mut String, title: &str, width: usize) {
    let _ = writeln!(msg, "{:<width$}", title, width = width);
}

fn entry(msg: &mut String, name: &str, width: usize, value: &str) {
    let label = format!("{}:", name);
    let _ = writeln!(msg, "  {:<width$}{}", label, value, width = width);
}

/// Format a number with thousands separators and at most three decimals
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let rounded = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && (grouped != "0" || !frac_part.is_empty());
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Remove the kind prefix from one exposition line
///
/// Sample lines start with the metric name; `# HELP` and `# TYPE` lines
/// carry it as their second token.
pub fn strip_kind_prefix(line: &str) -> String {
    for marker in ["# HELP ", "# TYPE "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return match MetricKind::classify(rest) {
                Some((_, name)) => format!("{}{}", marker, name),
                None => line.to_string(),
            };
        }
    }

    match MetricKind::classify(line) {
        Some((_, rest)) => rest.to_string(),
        None => line.to_string(),
    }
}

fn encode(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

impl MetricsRegistry {
    /// Render every metric in the Prometheus text exposition format
    ///
    /// Names appear as applications used them: the kind prefix is removed,
    /// the project prefix stays.
    pub fn to_prometheus(&self) -> Result<String> {
        self.flush_gauges()?;
        let families = self.gather()?;
        debug!("Encoding {} metric families", families.len());

        let text = encode(&families)?;
        Ok(text
            .split('\n')
            .map(strip_kind_prefix)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Build the JSON summary of the registry
    pub fn to_json(&self) -> Result<Snapshot> {
        let readings = self.flush_gauges()?;

        let mut snapshot = Snapshot {
            labels: self.labels(),
            ..Default::default()
        };
        for (name, reading) in readings {
            snapshot.insert(name, Sample::Gauge(reading));
        }

        for (metric_name, metric) in self.entries() {
            let name = MetricKind::classify(&metric_name)
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(metric_name);
            let sample = match metric {
                Metric::Counter(counter) => Sample::Counter(counter.get()),
                Metric::Gauge(gauge) => Sample::Gauge(GaugeReading::Number(gauge.get())),
                Metric::Timer(summary) => Sample::Timer(summary.snapshot()),
                Metric::Histogram(summary) => Sample::Histogram(summary.snapshot()),
            };
            snapshot.insert(name, sample);
        }

        for family in self.foreign_families() {
            let text = encode(std::slice::from_ref(&family))?;
            snapshot.insert(family.get_name(), Sample::Unknown(text));
        }

        Ok(snapshot)
    }

    /// Render the human readable console report
    pub fn to_console(&self) -> Result<String> {
        self.to_json()?.render_console()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_sample_lines() {
        assert_eq!(strip_kind_prefix("counter_test 1"), "test 1");
        assert_eq!(
            strip_kind_prefix("timer_op{quantile=\"0.5\"} 0.1"),
            "op{quantile=\"0.5\"} 0.1"
        );
        assert_eq!(strip_kind_prefix("process_cpu_seconds_total 3"), "process_cpu_seconds_total 3");
        assert_eq!(strip_kind_prefix(""), "");
    }

    #[test]
    fn test_strip_metadata_lines() {
        assert_eq!(strip_kind_prefix("# HELP gauge_depth depth"), "# HELP depth depth");
        assert_eq!(
            strip_kind_prefix("# TYPE histogram_size summary"),
            "# TYPE size summary"
        );
        assert_eq!(
            strip_kind_prefix("# HELP process_open_fds Open fds"),
            "# HELP process_open_fds Open fds"
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1000.0), "1,000");
        assert_eq!(format_number(1234567.891), "1,234,567.891");
        assert_eq!(format_number(-9876.5), "-9,876.5");
        assert_eq!(format_number(0.12345), "0.123");
        assert_eq!(format_number(-0.0001), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_snapshot_insert_groups_by_kind() {
        let mut snapshot = Snapshot::default();
        snapshot.insert("requests", Sample::Counter(2.0));
        snapshot.insert("depth", Sample::Gauge(GaugeReading::Number(4.0)));
        snapshot.insert("op", Sample::Timer(QuantileSummary::default()));
        snapshot.insert("size", Sample::Histogram(QuantileSummary::default()));
        snapshot.insert("legacy", Sample::Unknown("legacy 1".to_string()));

        assert_eq!(snapshot.counters.len(), 1);
        assert_eq!(snapshot.gauges.len(), 1);
        assert_eq!(snapshot.timers.len(), 1);
        assert_eq!(snapshot.histograms.len(), 1);
        assert_eq!(snapshot.unknown.len(), 1);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut snapshot = Snapshot::default();
        snapshot.labels.insert("env".to_string(), "prod".to_string());
        snapshot.insert(
            "op",
            Sample::Timer(QuantileSummary {
                p50: Some(0.5),
                p90: None,
                p95: None,
                p99: None,
                count: 1,
            }),
        );

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json_string().unwrap()).unwrap();
        assert_eq!(json["labels"]["env"], "prod");
        assert_eq!(json["timers"]["op"]["50"], 0.5);
        assert_eq!(json["timers"]["op"]["count"], 1);
        assert!(json["timers"]["op"].get("90").is_none());
        assert!(json["counters"].as_object().unwrap().is_empty());
        assert!(json["unknown"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_console_layout() {
        let mut snapshot = Snapshot::default();
        snapshot.labels.insert("env".to_string(), "prod".to_string());
        snapshot.insert("requests", Sample::Counter(1234.0));
        snapshot.insert("state", Sample::Gauge(GaugeReading::Text("warm".to_string())));

        let report = snapshot.render_console().unwrap();
        // width = len("requests") + 3
        let expected = [
            "****** METRICS ******",
            "Labels:    ",
            "  env:       \"prod\"",
            "Counters:  ",
            "  requests:         1,234",
            "Gauges:    ",
            "  state:     warm",
        ]
        .join("\n");
        assert_eq!(report, expected);
    }

    #[test]
    fn test_console_omits_empty_sections() {
        let report = Snapshot::default().render_console().unwrap();
        assert_eq!(report, "****** METRICS ******");
    }
}
