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
//! Periodic console reporting
//!
//! Logs the console report of a registry at a fixed interval through
//! `tracing`. A failing export is logged and the loop keeps running.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::error::Result;
use crate::types::MetricsConfig;
use crate::MetricsRegistry;

/// Background task logging the console report
#[derive(Clone)]
pub struct ConsoleReporter {
    registry: MetricsRegistry,
    period: Duration,
}

impl ConsoleReporter {
    /// Create a reporter for `registry`
    pub fn new(registry: MetricsRegistry, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Create a reporter when the configuration asks for one
    pub fn from_config(registry: MetricsRegistry, config: &MetricsConfig) -> Option<Self> {
        config
            .report_interval_secs
            .filter(|secs| *secs > 0)
            .map(|secs| Self::new(registry, Duration::from_secs(secs)))
    }

    /// Reporting period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Build and log one report
    pub fn report_once(&self) -> Result<String> {
        let report = self.registry.to_console()?;
        info!("\n{}", report);
        Ok(report)
    }

    /// Run the reporting loop on the current tokio runtime
    ///
    /// # Example
    /// ```ignore
    /// let reporter = ConsoleReporter::new(registry, Duration::from_secs(60));
    /// let handle = reporter.spawn();
    /// // ...
    /// handle.abort();
    /// ```
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.report_once() {
                    error!("Failed to report metrics: {}", e);
                }
            }
        })
    }
}
