//! End-to-end report construction: parse, normalize, aggregate, merge.

use chrono_tz::Tz;
use tracing::{info, warn};

use crate::analyzers::aggregate::aggregate;
use crate::analyzers::merge::merge;
use crate::analyzers::normalize::{Granularity, normalize};
use crate::analyzers::series::SeriesSpec;
use crate::analyzers::types::{Audit, KeyShape, RawTable, Report};
use crate::error::{ReportError, Result};
use crate::parser::{RawColumns, parse_series};
use crate::services::metrics_api::{MetricsApi, SeriesFetch};

/// Everything the core needs to turn series payloads into a report.
#[derive(Debug, Clone)]
pub struct ReportPlan {
    pub timezone: Tz,
    pub granularity: Granularity,
    pub shape: KeyShape,
    /// Series in join order; the first one anchors the key set.
    pub series: Vec<SeriesSpec>,
    pub columns: RawColumns,
}

impl ReportPlan {
    pub fn new(timezone: Tz, granularity: Granularity, shape: KeyShape, series: Vec<SeriesSpec>) -> Self {
        Self {
            timezone,
            granularity,
            shape,
            series,
            columns: RawColumns::default(),
        }
    }
}

/// Builds the merged report from one fetch outcome per planned series.
///
/// Failed fetches degrade to empty series and are listed in the audit.
/// Any schema problem aborts the whole build before output is produced.
#[tracing::instrument(skip_all, fields(series = plan.series.len()))]
pub fn build_report(plan: &ReportPlan, fetched: &[SeriesFetch]) -> Result<Report> {
    if fetched.len() != plan.series.len() {
        return Err(ReportError::SeriesCountMismatch {
            expected: plan.series.len(),
            found: fetched.len(),
        });
    }

    let mut audit = Audit::default();

    // Parse everything first so a schema error aborts before any aggregation.
    let mut raw_tables = Vec::with_capacity(fetched.len());
    for (spec, outcome) in plan.series.iter().zip(fetched) {
        let name = spec.name();
        let table = match outcome {
            SeriesFetch::Rows(body) => parse_series(&name, body, &plan.columns)?,
            SeriesFetch::Empty => RawTable::empty(&name),
            SeriesFetch::Failed(reason) => {
                warn!(series = %name, reason = %reason, "Series fetch failed, continuing with empty series");
                audit.degraded_series.push(name.clone());
                RawTable::empty(&name)
            }
        };
        if table.is_empty() && !matches!(outcome, SeriesFetch::Failed(_)) {
            info!(series = %name, "Series returned no samples");
            audit.empty_series.push(name.clone());
        }
        raw_tables.push(table);
    }

    let mut aggregates = Vec::with_capacity(raw_tables.len());
    for (spec, raw) in plan.series.iter().zip(&raw_tables) {
        let samples = normalize(raw, plan.timezone, plan.granularity, spec.is_scaled());
        let aggregated = aggregate(&samples, plan.shape, spec);
        audit.undefined_band.extend(aggregated.undefined);
        aggregates.push((*spec, aggregated.table));
    }

    let merged = merge(&aggregates)?;
    audit.dropped_keys = merged.dropped;

    info!(
        rows = merged.table.len(),
        empty = audit.empty_series.len(),
        degraded = audit.degraded_series.len(),
        undefined_band = audit.undefined_band.len(),
        dropped_keys = audit.dropped_keys.len(),
        "Report built"
    );

    Ok(Report {
        table: merged.table,
        audit,
    })
}

/// Fetches every planned series in order, then builds the report.
///
/// All fetches complete before aggregation starts.
#[tracing::instrument(skip_all, fields(series = plan.series.len()))]
pub async fn run_report<A: MetricsApi + ?Sized>(api: &A, plan: &ReportPlan) -> Result<Report> {
    let mut fetched = Vec::with_capacity(plan.series.len());
    for spec in &plan.series {
        let outcome = api.fetch_series(spec).await;
        match &outcome {
            SeriesFetch::Rows(body) => info!(series = %spec.name(), bytes = body.len(), "Series fetched"),
            SeriesFetch::Empty => info!(series = %spec.name(), "Series fetched, empty"),
            SeriesFetch::Failed(reason) => warn!(series = %spec.name(), reason = %reason, "Series fetch failed"),
        }
        fetched.push(outcome);
    }
    build_report(plan, &fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::series::Reduction;
    use crate::analyzers::types::Value;

    const HEADER: &str = "dt.entity.service_method.name,time,value";

    fn plan(series: Vec<SeriesSpec>) -> ReportPlan {
        ReportPlan::new(chrono_tz::UTC, Granularity::Day, KeyShape::EndpointBucket, series)
    }

    #[test]
    fn test_failed_fetch_degrades_to_empty_series() {
        let plan = plan(vec![
            SeriesSpec::percentile(50.0, Reduction::Mean),
            SeriesSpec::volume(),
        ]);
        let fetched = vec![
            SeriesFetch::Rows(format!("{HEADER}\nepA,2024-09-08 00:00:00,5000\n")),
            SeriesFetch::Failed("HTTP 503".to_string()),
        ];
        let report = build_report(&plan, &fetched).unwrap();

        assert_eq!(report.table.rows.len(), 1);
        assert_eq!(report.table.rows[0].values, vec![Value::Number(5.0), Value::Null]);
        assert_eq!(report.audit.degraded_series, vec!["volume"]);
        assert!(report.audit.empty_series.is_empty());
    }

    #[test]
    fn test_schema_error_aborts() {
        let plan = plan(vec![
            SeriesSpec::percentile(50.0, Reduction::Mean),
            SeriesSpec::volume(),
        ]);
        let fetched = vec![
            SeriesFetch::Rows(format!("{HEADER}\nepA,2024-09-08 00:00:00,5000\n")),
            SeriesFetch::Rows("name,value\nepA,1\n".to_string()),
        ];
        let err = build_report(&plan, &fetched).unwrap_err();
        assert!(matches!(err, ReportError::Schema { .. }));
    }

    #[test]
    fn test_series_count_must_match_plan() {
        let plan = plan(vec![SeriesSpec::volume()]);
        let err = build_report(&plan, &[]).unwrap_err();
        assert!(matches!(err, ReportError::SeriesCountMismatch { expected: 1, found: 0 }));
    }

    #[test]
    fn test_empty_series_recorded() {
        let plan = plan(vec![SeriesSpec::percentile(50.0, Reduction::Mean)]);
        let report = build_report(&plan, &[SeriesFetch::Empty]).unwrap();
        assert!(report.table.is_empty());
        assert_eq!(report.audit.empty_series, vec!["percentile(50)"]);
    }
}
