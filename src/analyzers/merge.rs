//! Folds per-series aggregate tables into the final wide report table.

use std::collections::HashMap;
use tracing::{info, warn};

use crate::analyzers::series::{BUCKET_COLUMN, ENDPOINT_COLUMN, JoinPolicy, SeriesSpec};
use crate::analyzers::types::{AggregateTable, DroppedKey, GroupKey, KeyShape, MergedRow, MergedTable, Value};
use crate::error::{ReportError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub table: MergedTable,
    /// Keys present only in left-joined series.
    pub dropped: Vec<DroppedKey>,
}

/// One metric column block contributed by a series.
struct Block {
    spec: SeriesSpec,
    columns: Vec<String>,
}

/// Merges `tables` pairwise in list order.
///
/// The first table is the anchor. Each following table is joined with its
/// own [`JoinPolicy`]: outer joins add unseen keys with null-filled earlier
/// columns, left joins drop them. Row order is anchor order followed by keys
/// added by later outer joins, in their table order. Rows are not sorted, so
/// a bucket that only a later series has lands after every anchor row;
/// callers that present the table by time must sort it themselves. Columns
/// are reordered to bucket, endpoint, percentiles ascending, error rate,
/// volume.
///
/// Every row of a table must hold exactly one value per declared column.
pub fn merge(tables: &[(SeriesSpec, AggregateTable)]) -> Result<Merged> {
    let Some((_, anchor)) = tables.first() else {
        return Ok(Merged {
            table: MergedTable {
                columns: vec![ENDPOINT_COLUMN.to_string()],
                has_bucket: false,
                rows: Vec::new(),
            },
            dropped: Vec::new(),
        });
    };
    let shape = anchor.shape;

    let mut keys: Vec<GroupKey> = Vec::new();
    let mut cells: Vec<Vec<Value>> = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut width = 0usize;
    let mut dropped = Vec::new();

    for (i, (spec, table)) in tables.iter().enumerate() {
        if table.shape != shape {
            return Err(ReportError::KeyShapeMismatch {
                series: table.series.clone(),
                expected: shape,
                found: table.shape,
            });
        }

        if let Some(row) = table.rows.iter().find(|r| r.values.len() != table.columns.len()) {
            return Err(ReportError::RowWidthMismatch {
                series: table.series.clone(),
                expected: table.columns.len(),
                found: row.values.len(),
            });
        }

        // The anchor always defines keys, whatever its configured policy.
        let join = if i == 0 { JoinPolicy::Outer } else { spec.join };
        let block_width = table.columns.len();

        let mut incoming: HashMap<&GroupKey, &Vec<Value>> =
            table.rows.iter().map(|r| (&r.key, &r.values)).collect();

        for (key, row) in keys.iter().zip(cells.iter_mut()) {
            match incoming.remove(key) {
                Some(values) => row.extend(values.iter().cloned()),
                None => row.extend(std::iter::repeat_n(Value::Null, block_width)),
            }
        }

        for row in &table.rows {
            if incoming.remove(&row.key).is_none() {
                continue;
            }
            match join {
                JoinPolicy::Outer => {
                    let mut values = vec![Value::Null; width];
                    values.extend(row.values.iter().cloned());
                    keys.push(row.key.clone());
                    cells.push(values);
                }
                JoinPolicy::Left => {
                    warn!(series = %table.series, key = %row.key, "Key absent from anchor rows, dropped");
                    dropped.push(DroppedKey {
                        series: table.series.clone(),
                        key: row.key.clone(),
                    });
                }
            }
        }

        width += block_width;
        blocks.push(Block {
            spec: *spec,
            columns: table.columns.clone(),
        });
    }

    let table = reorder(shape, &blocks, keys, cells);
    info!(rows = table.len(), series = tables.len(), dropped = dropped.len(), "Series merged");

    Ok(Merged { table, dropped })
}

/// Applies the canonical column order to the folded rows.
fn reorder(
    shape: KeyShape,
    blocks: &[Block],
    keys: Vec<GroupKey>,
    cells: Vec<Vec<Value>>,
) -> MergedTable {
    let mut offsets = Vec::with_capacity(blocks.len());
    let mut offset = 0;
    for block in blocks {
        offsets.push(offset);
        offset += block.columns.len();
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|a, b| {
        let (ra, pa) = blocks[*a].spec.column_rank();
        let (rb, pb) = blocks[*b].spec.column_rank();
        ra.cmp(&rb).then(pa.total_cmp(&pb))
    });

    let permutation: Vec<usize> = order
        .iter()
        .flat_map(|b| offsets[*b]..offsets[*b] + blocks[*b].columns.len())
        .collect();

    let has_bucket = shape == KeyShape::EndpointBucket;
    let mut columns = Vec::new();
    if has_bucket {
        columns.push(BUCKET_COLUMN.to_string());
    }
    columns.push(ENDPOINT_COLUMN.to_string());
    columns.extend(order.iter().flat_map(|b| blocks[*b].columns.iter().cloned()));

    let rows = keys
        .into_iter()
        .zip(cells)
        .map(|(key, values)| MergedRow {
            bucket: key.bucket,
            endpoint: key.endpoint,
            values: permutation.iter().map(|i| values[*i].clone()).collect(),
        })
        .collect();

    MergedTable {
        columns,
        has_bucket,
        rows,
    }
}
