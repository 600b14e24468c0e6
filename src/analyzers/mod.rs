//! Metric normalization, health banding, aggregation and merge.
//!
//! Series payloads are normalized into (endpoint, bucket, value) samples,
//! reduced per grouping key, and folded into one wide report table whose
//! column layout is fixed regardless of series order.

pub mod aggregate;
pub mod band;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod series;
pub mod types;
pub mod utility;
