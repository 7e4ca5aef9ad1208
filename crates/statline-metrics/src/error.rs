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
//! Error types for the metrics registry

use std::string::FromUtf8Error;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Errors raised while creating, flushing or exporting metrics
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The underlying Prometheus engine rejected a name, label or registration
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// A metric name is empty
    #[error("Invalid metric name: {0:?}")]
    InvalidName(String),

    /// A static label name cannot be carried by the exposition format
    #[error("Invalid label name: {0:?}")]
    InvalidLabel(String),

    /// A foreign collector exposes a family that is already present
    #[error("Metric family already registered: {0}")]
    AlreadyRegistered(String),

    /// A gauge collector failed while being flushed
    #[error("Gauge collector '{name}' failed: {source}")]
    Collector {
        /// Registered gauge name (project prefix included)
        name: String,
        /// Error returned by the collector
        #[source]
        source: anyhow::Error,
    },

    /// Text exposition produced bytes that are not UTF-8
    #[error("Metrics encoding produced invalid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),

    /// Snapshot serialization failed
    #[error("Failed to serialize metrics snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be parsed
    #[error("Failed to parse metrics configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl MetricsError {
    pub(crate) fn collector(name: impl Into<String>, source: anyhow::Error) -> Self {
        MetricsError::Collector {
            name: name.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_error_message() {
        let err = MetricsError::collector("svc_queue_depth", anyhow::anyhow!("queue closed"));
        assert_eq!(
            err.to_string(),
            "Gauge collector 'svc_queue_depth' failed: queue closed"
        );
    }

    #[test]
    fn test_invalid_label_message() {
        let err = MetricsError::InvalidLabel("my-label".to_string());
        assert_eq!(err.to_string(), "Invalid label name: \"my-label\"");
    }

    #[test]
    fn test_prometheus_error_conversion() {
        let err: MetricsError = prometheus::Error::Msg("bad name".to_string()).into();
        assert!(matches!(err, MetricsError::Prometheus(_)));
    }
}
