//! CLI entry point for the key-request health report.
//!
//! Provides subcommands for building a report from the metrics backend,
//! rebuilding one from saved CSV payloads, and validating configuration.

mod infra;

use crate::infra::dynatrace::client::DynatraceClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyreq_report::analyzers::pipeline::{build_report, run_report};
use keyreq_report::analyzers::types::Report;
use keyreq_report::config::{AppConfig, check_output_path};
use keyreq_report::output::{CsvSink, ReportSink, XlsxSink};
use keyreq_report::services::metrics_api::SeriesFetch;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "keyreq-report")]
#[command(about = "Per-endpoint response-time health reports", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "REPORT_CONFIG", default_value = "report.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured series and render the report
    Run {
        /// Override the configured output path
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Build the report from saved CSV payloads instead of fetching
    Render {
        /// One payload file per configured series, in configuration order
        #[arg(long = "series-file", value_name = "FILE", required = true)]
        series_files: Vec<String>,

        /// Override the configured output path
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate the configuration and print the resolved query window
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/keyreq_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("keyreq_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run { output } => {
            let token = std::env::var("TOKEN").context("TOKEN must be set (env or .env)")?;
            let window = config.window()?;
            let client = DynatraceClient::new(&config.source, window, &token)?;

            info!(
                from = %window.from_param(),
                to = %window.to_param(),
                series = config.series.len(),
                "Fetching series"
            );
            let report = run_report(&client, &config.plan()?).await?;
            render(&config, &report, output)?;
        }
        Commands::Render {
            series_files,
            output,
        } => {
            let fetched = series_files
                .iter()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .with_context(|| format!("reading series file {path}"))
                        .map(SeriesFetch::from_body)
                })
                .collect::<Result<Vec<_>>>()?;
            let report = build_report(&config.plan()?, &fetched)?;
            render(&config, &report, output)?;
        }
        Commands::CheckConfig => {
            let window = config.window()?;
            let plan = config.plan()?;
            info!(
                timezone = %plan.timezone,
                from = %window.from_param(),
                to = %window.to_param(),
                granularity = ?plan.granularity,
                group_by = ?plan.shape,
                "Configuration valid"
            );
            for spec in &plan.series {
                info!(series = %spec.name(), reduction = ?spec.reduction, join = ?spec.join, "Series");
            }
        }
    }

    Ok(())
}

/// Hands the report to the sink selected by the output file extension.
fn render(config: &AppConfig, report: &Report, output: Option<String>) -> Result<()> {
    let path = output.unwrap_or_else(|| config.report.output.clone());
    check_output_path(&path).context("--output")?;

    if !report.audit.is_clean() {
        warn!(audit = %serde_json::to_string(&report.audit)?, "Report built with gaps");
    }

    let sink: Box<dyn ReportSink> = if path.ends_with(".csv") {
        Box::new(CsvSink { path })
    } else {
        Box::new(XlsxSink {
            path,
            title: config.date_range_title(),
        })
    };
    sink.render(report)
}
