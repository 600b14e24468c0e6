//! Trait and types for pulling metric series from a monitoring backend.

use crate::analyzers::series::SeriesSpec;

/// Outcome of fetching one series.
///
/// Transport failures are carried as a value so the pipeline can degrade
/// them into an empty series explicitly instead of losing them.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesFetch {
    /// CSV payload as returned by the backend.
    Rows(String),
    /// The backend answered but had no samples.
    Empty,
    /// The request failed; the message is kept for the audit trail.
    Failed(String),
}

impl SeriesFetch {
    /// Wraps a payload body, mapping a blank body to [`SeriesFetch::Empty`].
    pub fn from_body(body: String) -> Self {
        if body.trim().is_empty() {
            SeriesFetch::Empty
        } else {
            SeriesFetch::Rows(body)
        }
    }
}

/// Abstraction over a metrics backend (e.g., Dynatrace).
#[async_trait::async_trait]
pub trait MetricsApi: Send + Sync {
    /// Fetches the raw CSV for one series over the client's configured window.
    async fn fetch_series(&self, spec: &SeriesSpec) -> SeriesFetch;
}
