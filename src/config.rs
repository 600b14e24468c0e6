use anyhow::{Context, bail};
use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::analyzers::normalize::Granularity;
use crate::analyzers::pipeline::ReportPlan;
use crate::analyzers::series::{JoinPolicy, MetricKind, Reduction, SeriesSpec};
use crate::analyzers::types::KeyShape;
use crate::error::ReportError;

/// Wall-clock format of `report.from` / `report.to`.
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub report: ReportConfig,
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Environment root, e.g. `https://host/e/<environment-id>`.
    pub base_url: String,
    #[serde(default)]
    pub management_zone: Option<String>,
    pub resolution: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_limit() -> u32 {
    700
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Local wall-clock start in `timezone`.
    pub from: String,
    /// Local wall-clock end in `timezone`.
    pub to: String,
    #[serde(default)]
    pub granularity: Granularity,
    pub group_by: KeyShape,
    pub output: String,
}

fn default_timezone() -> String {
    "Asia/Jakarta".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Percentile,
    Volume,
    ErrorRate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesConfig {
    pub metric: MetricName,
    #[serde(default)]
    pub percentile: Option<f64>,
    pub reduction: Reduction,
    #[serde(default)]
    pub join: Option<JoinPolicy>,
}

impl SeriesConfig {
    /// Percentile series default to outer joins, auxiliary series to left joins.
    fn to_spec(&self) -> anyhow::Result<SeriesSpec> {
        let spec = match self.metric {
            MetricName::Percentile => {
                let Some(p) = self.percentile else {
                    bail!("series.percentile is required for percentile series");
                };
                SeriesSpec::percentile(p, self.reduction)
            }
            MetricName::Volume => SeriesSpec {
                reduction: self.reduction,
                ..SeriesSpec::volume()
            },
            MetricName::ErrorRate => SeriesSpec {
                reduction: self.reduction,
                ..SeriesSpec::error_rate()
            },
        };
        Ok(match self.join {
            Some(join) => spec.with_join(join),
            None => spec,
        })
    }
}

/// Query window resolved to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub from: chrono::DateTime<Utc>,
    pub to: chrono::DateTime<Utc>,
}

impl QueryWindow {
    /// Backend query parameter form, e.g. `2024-09-07T17:00:00Z`.
    pub fn from_param(&self) -> String {
        self.from.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn to_param(&self) -> String {
        self.to.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn timezone(&self) -> Result<Tz, ReportError> {
        self.report
            .timezone
            .parse::<Tz>()
            .map_err(|_| ReportError::UnknownTimezone(self.report.timezone.clone()))
    }

    pub fn series_specs(&self) -> anyhow::Result<Vec<SeriesSpec>> {
        self.series.iter().map(SeriesConfig::to_spec).collect()
    }

    pub fn plan(&self) -> anyhow::Result<ReportPlan> {
        Ok(ReportPlan::new(
            self.timezone()?,
            self.report.granularity,
            self.report.group_by,
            self.series_specs()?,
        ))
    }

    /// Converts the local `from`/`to` wall-clock times into UTC.
    pub fn window(&self) -> anyhow::Result<QueryWindow> {
        let tz = self.timezone()?;
        Ok(QueryWindow {
            from: local_to_utc(&self.report.from, tz).context("report.from")?,
            to: local_to_utc(&self.report.to, tz).context("report.to")?,
        })
    }

    /// Title written above the report table.
    pub fn date_range_title(&self) -> String {
        let fmt = match self.report.granularity {
            Granularity::Day => "%Y-%m-%d",
            _ => "%Y-%m-%d %H:%M:%S",
        };
        let show = |s: &str| {
            NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT)
                .map(|t| t.format(fmt).to_string())
                .unwrap_or_else(|_| s.to_string())
        };
        format!("Date Range: {} - {}", show(&self.report.from), show(&self.report.to))
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.source.base_url.is_empty(), "source.base_url must be non-empty");
        anyhow::ensure!(!self.source.resolution.is_empty(), "source.resolution must be non-empty");
        anyhow::ensure!(self.source.limit > 0, "source.limit must be > 0, got {}", self.source.limit);
        anyhow::ensure!(
            self.source.timeout_secs > 0,
            "source.timeout_secs must be > 0, got {}",
            self.source.timeout_secs
        );
        check_output_path(&self.report.output).context("report.output")?;
        anyhow::ensure!(
            !(self.report.group_by == KeyShape::EndpointBucket
                && self.report.granularity == Granularity::None),
            "report.group_by = endpoint_bucket requires a report.granularity other than none"
        );
        anyhow::ensure!(!self.series.is_empty(), "at least one [[series]] must be configured");

        let window = self.window()?;
        anyhow::ensure!(
            window.from < window.to,
            "report.from must be before report.to ({} >= {})",
            self.report.from,
            self.report.to
        );

        let specs = self.series_specs()?;
        let mut seen = Vec::new();
        for spec in &specs {
            if let MetricKind::Percentile(p) = spec.kind {
                anyhow::ensure!(
                    p > 0.0 && p <= 100.0,
                    "series.percentile must be in (0, 100], got {p}"
                );
            }
            anyhow::ensure!(
                spec.reduction != Reduction::BandDistribution
                    || matches!(spec.kind, MetricKind::Percentile(_)),
                "{} series cannot use band_distribution, only percentile series can",
                spec.name()
            );
            for column in spec.columns() {
                anyhow::ensure!(!seen.contains(&column), "duplicate report column '{column}'");
                seen.push(column);
            }
        }
        Ok(())
    }
}

/// Output paths must name a sink: `.xlsx` or `.csv`.
pub fn check_output_path(path: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!path.is_empty(), "output path must be non-empty");
    anyhow::ensure!(
        path.ends_with(".xlsx") || path.ends_with(".csv"),
        "output path must end in .xlsx or .csv, got '{path}'"
    );
    Ok(())
}

fn local_to_utc(s: &str, tz: Tz) -> anyhow::Result<chrono::DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT)
        .with_context(|| format!("'{s}' is not {LOCAL_TIME_FORMAT}"))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("'{s}' does not exist in {tz}"))?;
    Ok(local.with_timezone(&Utc))
}
