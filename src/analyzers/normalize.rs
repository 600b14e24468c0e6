//! Maps raw series rows into the canonical (endpoint, bucket, value) shape.

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use crate::analyzers::types::{NormalizedSample, RawTable};
use crate::analyzers::utility::round_to;

/// Display granularity of bucket timestamps after timezone conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Drop the time dimension even when the payload carries one.
    None,
    Minute,
    #[default]
    Second,
    Day,
}

impl Granularity {
    pub fn format_str(&self) -> Option<&'static str> {
        match self {
            Granularity::None => None,
            Granularity::Minute => Some("%Y-%m-%d %H:%M"),
            Granularity::Second => Some("%Y-%m-%d %H:%M:%S"),
            Granularity::Day => Some("%Y-%m-%d"),
        }
    }
}

/// Converts milliseconds to seconds at two-decimal precision.
pub fn scale_millis(raw: f64) -> f64 {
    round_to(raw / 1000.0, 2)
}

/// Normalizes every row of `table`; the output has the same row count.
///
/// Bucket times are converted from UTC into `tz` and formatted per
/// `granularity`. Values are passed through [`scale_millis`] when `scaled`
/// is set.
pub fn normalize(
    table: &RawTable,
    tz: Tz,
    granularity: Granularity,
    scaled: bool,
) -> Vec<NormalizedSample> {
    let format = if table.has_time {
        granularity.format_str()
    } else {
        None
    };

    let samples: Vec<NormalizedSample> = table
        .rows
        .iter()
        .map(|row| {
            let bucket_time = match (format, row.bucket_time) {
                (Some(fmt), Some(t)) => Some(t.with_timezone(&tz).format(fmt).to_string()),
                _ => None,
            };
            let value = if scaled {
                scale_millis(row.raw_value)
            } else {
                row.raw_value
            };
            NormalizedSample {
                endpoint: row.entity_name.clone(),
                bucket_time,
                value,
            }
        })
        .collect();

    debug!(series = %table.series, rows = samples.len(), tz = %tz, "Series normalized");
    samples
}
