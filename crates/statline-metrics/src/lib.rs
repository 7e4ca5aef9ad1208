//! Statline Metrics
//!
//! In-process metrics registry with Prometheus text exposition, a JSON
//! summary and a console report.
//!
//! # Features
//!
//! - **Get-or-create handles**: counters, histograms and timers are created on
//!   first access and shared afterwards
//! - **Lazy gauges**: collector closures evaluated on every export
//! - **Naming scheme**: project prefix plus an internal kind prefix that never
//!   reaches the exported output
//! - **Static labels**: attached to every exported sample
//! - **Sliding windows**: optional aging for timer and histogram quantiles
//!
//! # Example
//!
//! ```ignore
//! use statline_metrics::MetricsRegistry;
//!
//! fn main() -> statline_metrics::Result<()> {
//!     let registry = MetricsRegistry::new();
//!     registry.set_project_name("svc");
//!     registry.set_static_labels([("env", "prod")])?;
//!
//!     registry.counter("requests")?.inc();
//!     registry.gauge("queue_depth", || 12)?;
//!     let answer = registry.timer("compute")?.time(|| 42);
//!
//!     println!("{}", registry.to_prometheus()?);
//!     println!("{}", registry.to_console()?);
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod error;
pub mod export;
pub mod instrument;
pub mod registry;
pub mod reporter;
pub mod summary;
pub mod timer;
pub mod types;

pub use collector::{GaugeCollector, GaugeReading};
pub use error::{MetricsError, Result};
pub use export::{Sample, Snapshot};
pub use instrument::{instrumented_name, Instrumented};
pub use registry::MetricsRegistry;
pub use reporter::ConsoleReporter;
pub use summary::{QuantileSummary, QUANTILES};
pub use timer::{Histogram, Timer, TimerGuard};
pub use types::{MetricKind, MetricsConfig, SummaryConfig};

// Re-export prometheus types for convenience
pub use prometheus::{core::Collector, Counter};
