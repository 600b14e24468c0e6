// Config loading and validation tests

use keyreq_report::analyzers::normalize::Granularity;
use keyreq_report::analyzers::series::{JoinPolicy, MetricKind, Reduction};
use keyreq_report::analyzers::types::KeyShape;
use keyreq_report::config::{AppConfig, check_output_path};

const VALID_CONFIG: &str = r#"
[source]
base_url = "https://dt.example.com/e/env-1"
management_zone = "-413968960818628324"
resolution = "1d"

[report]
timezone = "Asia/Jakarta"
from = "2024-08-26T00:00:00"
to = "2024-09-11T00:00:00"
granularity = "day"
group_by = "endpoint_bucket"
output = "output_percentile_merge1D.xlsx"

[[series]]
metric = "percentile"
percentile = 50.0
reduction = "mean"

[[series]]
metric = "percentile"
percentile = 75.0
reduction = "mean"

[[series]]
metric = "volume"
reduction = "sum"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.source.limit, 700);
    assert_eq!(config.source.timeout_secs, 30);
    assert!(!config.source.accept_invalid_certs);
    assert_eq!(config.report.granularity, Granularity::Day);
    assert_eq!(config.report.group_by, KeyShape::EndpointBucket);
    assert_eq!(config.series.len(), 3);
}

#[test]
fn test_default_join_policies() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    let specs = config.series_specs().unwrap();
    assert_eq!(specs[0].kind, MetricKind::Percentile(50.0));
    assert_eq!(specs[1].join, JoinPolicy::Outer);
    assert_eq!(specs[2].kind, MetricKind::Volume);
    assert_eq!(specs[2].join, JoinPolicy::Left);
    assert_eq!(specs[2].reduction, Reduction::Sum);
}

#[test]
fn test_explicit_join_override() {
    let cfg = format!("{VALID_CONFIG}join = \"outer\"\n");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(config.series_specs().unwrap()[2].join, JoinPolicy::Outer);
}

#[test]
fn test_window_converts_local_time_to_utc() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    let window = config.window().unwrap();
    assert_eq!(window.from_param(), "2024-08-25T17:00:00Z");
    assert_eq!(window.to_param(), "2024-09-10T17:00:00Z");
}

#[test]
fn test_date_range_title() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.date_range_title(), "Date Range: 2024-08-26 - 2024-09-11");

    let cfg = VALID_CONFIG.replace("granularity = \"day\"", "granularity = \"second\"");
    let config = AppConfig::load_from_str(&cfg).unwrap();
    assert_eq!(
        config.date_range_title(),
        "Date Range: 2024-08-26 00:00:00 - 2024-09-11 00:00:00"
    );
}

#[test]
fn test_config_validation_rejects_unknown_timezone() {
    let bad = VALID_CONFIG.replace("Asia/Jakarta", "Mars/Olympus");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("Mars/Olympus"));
}

#[test]
fn test_config_validation_rejects_inverted_window() {
    let bad = VALID_CONFIG.replace("2024-09-11T00:00:00", "2024-08-01T00:00:00");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("report.from"));
}

#[test]
fn test_config_validation_rejects_bucket_grouping_without_granularity() {
    let bad = VALID_CONFIG.replace("granularity = \"day\"", "granularity = \"none\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("group_by"));
}

#[test]
fn test_config_validation_rejects_missing_percentile() {
    let bad = VALID_CONFIG.replace("percentile = 75.0\n", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("series.percentile"));
}

#[test]
fn test_config_validation_rejects_out_of_range_percentile() {
    let bad = VALID_CONFIG.replace("percentile = 75.0", "percentile = 175.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("(0, 100]"));
}

#[test]
fn test_config_validation_rejects_duplicate_columns() {
    let bad = VALID_CONFIG.replace("percentile = 75.0", "percentile = 50.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_config_validation_rejects_volume_band_distribution() {
    let bad = VALID_CONFIG.replace("reduction = \"sum\"", "reduction = \"band_distribution\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("band_distribution"));
}

#[test]
fn test_config_validation_rejects_unknown_output_extension() {
    let bad = VALID_CONFIG.replace("output_percentile_merge1D.xlsx", "report.pdf");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("report.output"));
}

#[test]
fn test_config_validation_rejects_error_rate_band_distribution() {
    let bad = format!(
        "{VALID_CONFIG}\n[[series]]\nmetric = \"error_rate\"\nreduction = \"band_distribution\"\n"
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("error_rate"));
    assert!(msg.contains("band_distribution"));
}

#[test]
fn test_output_path_override_must_name_a_sink() {
    assert!(check_output_path("report.xlsx").is_ok());
    assert!(check_output_path("out/report.csv").is_ok());
    let err = check_output_path("report.pdf").unwrap_err();
    assert!(err.to_string().contains("report.pdf"));
    assert!(check_output_path("").is_err());
}
