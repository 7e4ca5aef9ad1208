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
//! Handles for distribution metrics

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::summary::{QuantileSummary, SummaryMetric};

/// Handle to a histogram metric
///
/// Clones share the same underlying summary.
#[derive(Clone)]
pub struct Histogram {
    inner: Arc<SummaryMetric>,
}

impl Histogram {
    pub(crate) fn new(inner: Arc<SummaryMetric>) -> Self {
        Self { inner }
    }

    /// Record one observation
    pub fn observe(&self, value: f64) {
        self.inner.observe(value);
    }

    /// Current quantile record
    pub fn quantiles(&self) -> QuantileSummary {
        self.inner.snapshot()
    }

    /// Engine name of the metric, kind prefix included
    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Handle to a timer metric, recording durations in seconds
#[derive(Clone)]
pub struct Timer {
    inner: Arc<SummaryMetric>,
}

impl Timer {
    pub(crate) fn new(inner: Arc<SummaryMetric>) -> Self {
        Self { inner }
    }

    /// Time a synchronous body
    ///
    /// Exactly one sample is recorded, also when `body` panics.
    pub fn time<T, F>(&self, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        let guard = self.start();
        let result = body();
        guard.stop();
        result
    }

    /// Time a future until it completes
    ///
    /// The clock starts on first poll. A future dropped before completion
    /// still records the time it ran.
    pub async fn time_async<T, F>(&self, body: F) -> T
    where
        F: Future<Output = T>,
    {
        let guard = self.start();
        let result = body.await;
        guard.stop();
        result
    }

    /// Start timing now and stop later
    pub fn start(&self) -> TimerGuard {
        TimerGuard {
            inner: Some(Arc::clone(&self.inner)),
            started: Instant::now(),
        }
    }

    /// Record an externally measured duration
    pub fn observe_duration(&self, duration: Duration) {
        self.inner.observe(duration.as_secs_f64());
    }

    /// Current quantile record, in seconds
    pub fn quantiles(&self) -> QuantileSummary {
        self.inner.snapshot()
    }

    /// Engine name of the metric, kind prefix included
    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Running measurement started by [`Timer::start`]
///
/// Records on `stop` or on drop, whichever comes first.
#[must_use = "a timer guard records as soon as it is dropped"]
pub struct TimerGuard {
    inner: Option<Arc<SummaryMetric>>,
    started: Instant,
}

impl TimerGuard {
    /// Stop the measurement, record it and return the elapsed seconds
    pub fn stop(mut self) -> f64 {
        self.record()
    }

    /// Seconds elapsed so far, without recording
    pub fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn record(&mut self) -> f64 {
        let elapsed = self.elapsed();
        if let Some(inner) = self.inner.take() {
            inner.observe(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.record();
    }
}
