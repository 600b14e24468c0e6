//! CSV decoder for series payloads returned by the metrics backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::analyzers::types::{RawSample, RawTable};
use crate::error::{ReportError, Result};

/// Header names of the raw payload columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumns {
    pub entity_id: String,
    pub entity_name: String,
    pub time: String,
    pub value: String,
}

impl Default for RawColumns {
    fn default() -> Self {
        Self {
            entity_id: "dt.entity.service_method".to_string(),
            entity_name: "dt.entity.service_method.name".to_string(),
            time: "time".to_string(),
            value: "value".to_string(),
        }
    }
}

/// Decodes a CSV payload into a [`RawTable`].
///
/// A blank payload is an empty series, not an error. Once a header is
/// present, the entity-name and value columns are required; the id and time
/// columns are optional.
///
/// # Errors
///
/// Returns [`ReportError::Schema`] for a missing required column, a value
/// that is not numeric, or a timestamp that cannot be parsed.
pub fn parse_series(series: &str, payload: &str, columns: &RawColumns) -> Result<RawTable> {
    if payload.trim().is_empty() {
        return Ok(RawTable::empty(series));
    }

    let mut rdr = ReaderBuilder::new().from_reader(payload.as_bytes());
    let headers = rdr.headers()?.clone();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let name_idx =
        find(columns.entity_name.as_str()).ok_or_else(|| ReportError::missing_column(series, &columns.entity_name))?;
    let value_idx =
        find(columns.value.as_str()).ok_or_else(|| ReportError::missing_column(series, &columns.value))?;
    let id_idx = find(columns.entity_id.as_str());
    let time_idx = find(columns.time.as_str());

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim();

        let raw_value = parse_value(cell(value_idx))
            .ok_or_else(|| ReportError::invalid_value(series, &columns.value, cell(value_idx)))?;

        let bucket_time = match time_idx {
            Some(idx) => Some(
                parse_time(cell(idx))
                    .ok_or_else(|| ReportError::invalid_value(series, &columns.time, cell(idx)))?,
            ),
            None => None,
        };

        rows.push(RawSample {
            entity_id: id_idx.map(|idx| cell(idx).to_string()).unwrap_or_default(),
            entity_name: field(&record, name_idx),
            bucket_time,
            raw_value,
        });
    }

    debug!(series, rows = rows.len(), has_time = time_idx.is_some(), "Series payload parsed");

    Ok(RawTable {
        series: series.to_string(),
        has_time: time_idx.is_some(),
        rows,
    })
}

/// Endpoint names are kept byte-for-byte, without trimming.
fn field(record: &StringRecord, idx: usize) -> String {
    record.get(idx).unwrap_or("").to_string()
}

/// An empty cell is a missing sample (`NaN`); anything else must be numeric.
fn parse_value(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Accepts RFC 3339, or a naive timestamp interpreted as UTC.
fn parse_time(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(cell) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
        .map(|naive| naive.and_utc())
}
