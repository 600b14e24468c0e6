use crate::analyzers::band::categorize;
use crate::analyzers::series::{Reduction, SeriesSpec};
use crate::analyzers::types::{
    AggregateRow, AggregateTable, Band, BandCounts, GroupKey, KeyShape, NormalizedSample,
    UndefinedBandEntry, Value,
};
use crate::analyzers::utility::{format_percent, mean, sum};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Result of aggregating one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub table: AggregateTable,
    /// Groups that contained boundary values, excluded from the band columns.
    pub undefined: Vec<UndefinedBandEntry>,
}

/// Groups `samples` by `shape` and reduces each group per `spec.reduction`.
///
/// Groups are emitted in ascending key order. An empty input yields an empty
/// table with the series' columns.
pub fn aggregate(samples: &[NormalizedSample], shape: KeyShape, spec: &SeriesSpec) -> Aggregated {
    let series = spec.name();
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();

    for sample in samples {
        let bucket = match shape {
            KeyShape::Endpoint => None,
            KeyShape::EndpointBucket => sample.bucket_time.as_deref(),
        };
        groups
            .entry(GroupKey::new(&sample.endpoint, bucket))
            .or_default()
            .push(sample.value);
    }

    let mut undefined = Vec::new();
    let rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(key, values)| {
            let values = match spec.reduction {
                Reduction::BandDistribution => {
                    let counts = band_counts(&values);
                    if counts.missing > 0 {
                        debug!(series = %series, key = %key, count = counts.missing, "Missing samples skipped");
                    }
                    if counts.undefined > 0 {
                        warn!(
                            series = %series,
                            key = %key,
                            count = counts.undefined,
                            "Samples on a band boundary excluded from distribution"
                        );
                        undefined.push(UndefinedBandEntry {
                            series: series.clone(),
                            key: key.clone(),
                            count: counts.undefined,
                        });
                    }
                    Band::REPORTED
                        .iter()
                        .map(|band| Value::Count(counts.get(*band)))
                        .collect()
                }
                Reduction::Mean if spec.renders_percent() => {
                    vec![format_percent(mean(&values)).map_or(Value::Null, Value::Text)]
                }
                Reduction::Mean => vec![Value::number(mean(&values))],
                Reduction::Sum => vec![Value::number(sum(&values))],
            };
            AggregateRow { key, values }
        })
        .collect();

    debug!(series = %series, groups = rows.len(), "Series aggregated");

    Aggregated {
        table: AggregateTable {
            series,
            shape,
            columns: spec.columns(),
            rows,
        },
        undefined,
    }
}

/// Tallies the band of every value in a group. `NaN` samples are counted as
/// missing, never as boundary values.
pub fn band_counts(values: &[f64]) -> BandCounts {
    let mut counts = BandCounts::default();
    for v in values {
        if v.is_nan() {
            counts.missing += 1;
        } else {
            counts.record(categorize(*v));
        }
    }
    counts
}
