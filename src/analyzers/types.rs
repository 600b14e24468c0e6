//! Data types used by the report pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row decoded from a series payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub entity_id: String,
    pub entity_name: String,
    pub bucket_time: Option<DateTime<Utc>>,
    /// `NaN` when the backend left the cell empty.
    pub raw_value: f64,
}

/// All rows of one fetched series.
///
/// `has_time` records whether the payload carried a bucket-time column at
/// all; an empty payload has neither rows nor a time column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub series: String,
    pub has_time: bool,
    pub rows: Vec<RawSample>,
}

impl RawTable {
    pub fn empty(series: &str) -> Self {
        Self {
            series: series.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSample {
    pub endpoint: String,
    pub bucket_time: Option<String>,
    pub value: f64,
}

/// Health band of a response-time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Green,
    Yellow,
    Red,
    Undefined,
}

impl Band {
    /// Bands emitted as distribution columns, in column order.
    pub const REPORTED: [Band; 3] = [Band::Green, Band::Yellow, Band::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Green => "green",
            Band::Yellow => "yellow",
            Band::Red => "red",
            Band::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-group tally of bands. `undefined` never becomes a column but is kept
/// so boundary samples stay auditable. `missing` counts empty samples, which
/// belong to no band and are not boundary values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandCounts {
    pub green: u64,
    pub yellow: u64,
    pub red: u64,
    pub undefined: u64,
    pub missing: u64,
}

impl BandCounts {
    pub fn record(&mut self, band: Band) {
        match band {
            Band::Green => self.green += 1,
            Band::Yellow => self.yellow += 1,
            Band::Red => self.red += 1,
            Band::Undefined => self.undefined += 1,
        }
    }

    pub fn get(&self, band: Band) -> u64 {
        match band {
            Band::Green => self.green,
            Band::Yellow => self.yellow,
            Band::Red => self.red,
            Band::Undefined => self.undefined,
        }
    }
}

/// Which columns form the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    Endpoint,
    EndpointBucket,
}

/// Grouping key. Bucket strings are compared as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub endpoint: String,
    pub bucket: Option<String>,
}

impl GroupKey {
    pub fn new(endpoint: &str, bucket: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            bucket: bucket.map(str::to_string),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            Some(bucket) => write!(f, "{} @ {}", self.endpoint, bucket),
            None => f.write_str(&self.endpoint),
        }
    }
}

/// A single metric cell. `Null` marks "no data", never zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Count(u64),
    Text(String),
    Null,
}

impl Value {
    /// Wraps a float, mapping `NaN` to [`Value::Null`].
    pub fn number(v: f64) -> Self {
        if v.is_nan() { Value::Null } else { Value::Number(v) }
    }

    /// Text written into a CSV cell; nulls become blank.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Number(v) => v.to_string(),
            Value::Count(c) => c.to_string(),
            Value::Text(s) => s.clone(),
            Value::Null => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub values: Vec<Value>,
}

/// Output of one aggregation call: one row per distinct key, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    pub series: String,
    pub shape: KeyShape,
    pub columns: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub bucket: Option<String>,
    pub endpoint: String,
    pub values: Vec<Value>,
}

/// Final wide table handed to a sink. `columns` is the full header, key
/// columns included.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub has_bucket: bool,
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index into `MergedRow::values` for a metric column header.
    pub fn metric_index(&self, column: &str) -> Option<usize> {
        let offset = if self.has_bucket { 2 } else { 1 };
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| i.checked_sub(offset))
    }

    /// Each row as CSV-ready cells, aligned with `columns`.
    pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|row| {
            let mut record = Vec::with_capacity(self.columns.len());
            if self.has_bucket {
                record.push(row.bucket.clone().unwrap_or_default());
            }
            record.push(row.endpoint.clone());
            record.extend(row.values.iter().map(Value::to_cell));
            record
        })
    }
}

/// Number of boundary-valued samples seen in a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedBandEntry {
    pub series: String,
    pub key: GroupKey,
    pub count: u64,
}

/// A key present in an auxiliary series but absent from the anchor key set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedKey {
    pub series: String,
    pub key: GroupKey,
}

/// Non-fatal conditions observed during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Audit {
    pub empty_series: Vec<String>,
    pub degraded_series: Vec<String>,
    pub undefined_band: Vec<UndefinedBandEntry>,
    pub dropped_keys: Vec<DroppedKey>,
}

impl Audit {
    pub fn is_clean(&self) -> bool {
        self.empty_series.is_empty()
            && self.degraded_series.is_empty()
            && self.undefined_band.is_empty()
            && self.dropped_keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub table: MergedTable,
    pub audit: Audit,
}
