//! Descriptors for the metric series a report is built from.

use serde::Deserialize;

use crate::analyzers::types::Band;
use crate::analyzers::utility::format_percentile;

pub const ENDPOINT_COLUMN: &str = "API Name";
pub const BUCKET_COLUMN: &str = "Timestamp";
pub const VOLUME_COLUMN: &str = "Total Request";
pub const ERROR_RATE_COLUMN: &str = "Error Rate";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    /// Response-time percentile, reported in milliseconds by the backend.
    Percentile(f64),
    /// Request count.
    Volume,
    /// Server-side error rate, already a percentage.
    ErrorRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    BandDistribution,
    Mean,
    Sum,
}

/// How a series attaches to the rows merged so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Keep the union of keys.
    #[default]
    Outer,
    /// Keep only keys already present; extra keys are dropped and audited.
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSpec {
    pub kind: MetricKind,
    pub reduction: Reduction,
    pub join: JoinPolicy,
}

impl SeriesSpec {
    pub fn percentile(p: f64, reduction: Reduction) -> Self {
        Self {
            kind: MetricKind::Percentile(p),
            reduction,
            join: JoinPolicy::Outer,
        }
    }

    pub fn volume() -> Self {
        Self {
            kind: MetricKind::Volume,
            reduction: Reduction::Sum,
            join: JoinPolicy::Left,
        }
    }

    pub fn error_rate() -> Self {
        Self {
            kind: MetricKind::ErrorRate,
            reduction: Reduction::Mean,
            join: JoinPolicy::Left,
        }
    }

    pub fn with_join(mut self, join: JoinPolicy) -> Self {
        self.join = join;
        self
    }

    /// Identifier used in logs and the audit trail.
    pub fn name(&self) -> String {
        match self.kind {
            MetricKind::Percentile(p) => format!("percentile({})", format_percentile(p)),
            MetricKind::Volume => "volume".to_string(),
            MetricKind::ErrorRate => "error_rate".to_string(),
        }
    }

    /// Only response times arrive in milliseconds; counts and rates are kept as-is.
    pub fn is_scaled(&self) -> bool {
        matches!(self.kind, MetricKind::Percentile(_))
    }

    pub fn renders_percent(&self) -> bool {
        matches!(self.kind, MetricKind::ErrorRate) && self.reduction == Reduction::Mean
    }

    /// Report headers this series contributes, in order.
    pub fn columns(&self) -> Vec<String> {
        match (self.kind, self.reduction) {
            (MetricKind::Percentile(p), Reduction::BandDistribution) => Band::REPORTED
                .iter()
                .map(|band| format!("{} {}", band, format_percentile(p)))
                .collect(),
            (MetricKind::Percentile(p), _) => vec![format!("Percentile {}", format_percentile(p))],
            (MetricKind::Volume, _) => vec![VOLUME_COLUMN.to_string()],
            (MetricKind::ErrorRate, _) => vec![ERROR_RATE_COLUMN.to_string()],
        }
    }

    /// Sort position in the final report: percentiles ascending, then error
    /// rate, then volume.
    pub(crate) fn column_rank(&self) -> (u8, f64) {
        match self.kind {
            MetricKind::Percentile(p) => (0, p),
            MetricKind::ErrorRate => (1, 0.0),
            MetricKind::Volume => (2, 0.0),
        }
    }
}
