//! Report sinks: CSV and styled XLSX.
//!
//! The XLSX sink renders from a staging CSV written next to the output file.
//! The staging file is removed once rendering ends, whether it succeeded or
//! not.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use rust_xlsxwriter::{
    Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, FormatAlign, FormatBorder,
    Workbook, Worksheet,
};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::analyzers::series::{BUCKET_COLUMN, ENDPOINT_COLUMN};
use crate::analyzers::types::{Band, MergedTable, Report};

const GREEN: u32 = 0x66FF66;
const YELLOW: u32 = 0xFFFF66;
const RED: u32 = 0xFF6666;

/// Consumes a finished report.
pub trait ReportSink {
    fn render(&self, report: &Report) -> Result<()>;
}

/// Writes `table` as CSV: header row, then one record per merged row.
/// Null cells are left blank.
pub fn write_csv<W: Write>(table: &MergedTable, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(&table.columns)?;
    for record in table.records() {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the merged table straight to a CSV file.
pub struct CsvSink {
    pub path: String,
}

impl ReportSink for CsvSink {
    fn render(&self, report: &Report) -> Result<()> {
        let file = std::fs::File::create(&self.path)
            .with_context(|| format!("creating {}", self.path))?;
        write_csv(&report.table, file)?;
        info!(path = %self.path, rows = report.table.len(), "CSV report written");
        Ok(())
    }
}

/// Renders the merged table into a styled workbook.
pub struct XlsxSink {
    pub path: String,
    /// Text for the first row, e.g. `Date Range: 2024-09-08 - 2024-09-09`.
    pub title: String,
}

impl ReportSink for XlsxSink {
    fn render(&self, report: &Report) -> Result<()> {
        let dir = Path::new(&self.path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let staged = stage_csv(&report.table, dir)?;
        debug!(staging = %staged.path().display(), "Staging CSV written");

        let rendered = render_workbook(staged.path(), &self.title, &self.path);

        let staging_path = staged.path().display().to_string();
        match staged.close() {
            Ok(()) => debug!(staging = %staging_path, "Staging CSV removed"),
            Err(e) => warn!(staging = %staging_path, error = %e, "Failed to remove staging CSV"),
        }

        rendered?;
        info!(path = %self.path, rows = report.table.len(), "XLSX report written");
        Ok(())
    }
}

fn stage_csv(table: &MergedTable, dir: &Path) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix(".report-staging-")
        .suffix(".csv")
        .tempfile_in(dir)
        .with_context(|| format!("creating staging CSV in {}", dir.display()))?;
    write_csv(table, staged.as_file_mut())?;
    Ok(staged)
}

/// Reads the staging CSV back and lays it out: title in row 0, header in
/// row 1, data from row 2.
fn render_workbook(csv_path: &Path, title: &str, out: &str) -> Result<()> {
    let mut rdr = ReaderBuilder::new().from_path(csv_path)?;
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let records: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1")?;
    sheet.write_string(0, 0, title)?;

    let key_columns = headers
        .iter()
        .take_while(|h| !is_metric_header(h))
        .count() as u16;
    let has_bands = headers.iter().any(|h| band_of(h).is_some());

    let centered = Format::new().set_align(FormatAlign::Center).set_border(FormatBorder::Thin);
    for (col, header) in headers.iter().enumerate() {
        let col = col as u16;
        match band_of(header) {
            Some(band) => {
                let fill = centered.clone().set_background_color(Color::RGB(band_color(band)));
                sheet.write_string_with_format(1, col, header, &fill)?;
            }
            None => {
                sheet.write_string_with_format(1, col, header, &centered)?;
            }
        }
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 2;
        for (col, cell) in record.iter().enumerate() {
            let col = col as u16;
            if cell.is_empty() {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(v) if col >= key_columns => sheet.write_number_with_format(row, col, v, &centered)?,
                _ => sheet.write_string_with_format(row, col, cell, &centered)?,
            };
        }
    }

    let key_width = 50.0;
    let metric_width = if has_bands { 10.0 } else { 20.0 };
    for col in 0..headers.len() as u16 {
        let width = if col < key_columns { key_width } else { metric_width };
        sheet.set_column_width(col, width)?;
    }

    if !records.is_empty() {
        let last_row = records.len() as u32 + 1;
        for (col, header) in headers.iter().enumerate() {
            if header.starts_with("Percentile ") {
                add_health_formats(sheet, col as u16, last_row)?;
            }
        }
    }

    workbook
        .save(out)
        .with_context(|| format!("saving workbook {out}"))?;
    Ok(())
}

/// Colours a numeric response-time column by health band.
fn add_health_formats(sheet: &mut Worksheet, col: u16, last_row: u32) -> Result<()> {
    let rules = [
        (ConditionalFormatCellRule::Between(0.0, 999.0), GREEN),
        (ConditionalFormatCellRule::Between(1000.0, 1999.0), YELLOW),
        (ConditionalFormatCellRule::GreaterThan(1999.0), RED),
    ];
    for (rule, color) in rules {
        let format = Format::new().set_background_color(Color::RGB(color));
        let conditional = ConditionalFormatCell::new().set_rule(rule).set_format(&format);
        sheet.add_conditional_format(2, col, last_row, col, &conditional)?;
    }
    Ok(())
}

fn is_metric_header(header: &str) -> bool {
    header != BUCKET_COLUMN && header != ENDPOINT_COLUMN
}

/// Band named by a distribution column header such as `yellow 95`.
fn band_of(header: &str) -> Option<Band> {
    let prefix = header.split_whitespace().next()?;
    Band::REPORTED.into_iter().find(|b| b.as_str() == prefix)
}

fn band_color(band: Band) -> u32 {
    match band {
        Band::Green => GREEN,
        Band::Yellow => YELLOW,
        Band::Red | Band::Undefined => RED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{Audit, MergedRow, Value};

    fn report() -> Report {
        Report {
            table: MergedTable {
                columns: vec![
                    "Timestamp".to_string(),
                    "API Name".to_string(),
                    "Percentile 50".to_string(),
                    "Error Rate".to_string(),
                    "Total Request".to_string(),
                ],
                has_bucket: true,
                rows: vec![
                    MergedRow {
                        bucket: Some("2024-09-08".to_string()),
                        endpoint: "GET /a, b".to_string(),
                        values: vec![
                            Value::Number(1.25),
                            Value::Text("12 %".to_string()),
                            Value::Number(100.0),
                        ],
                    },
                    MergedRow {
                        bucket: Some("2024-09-09".to_string()),
                        endpoint: "GET /a, b".to_string(),
                        values: vec![Value::Number(6.0), Value::Null, Value::Null],
                    },
                ],
            },
            audit: Audit::default(),
        }
    }

    #[test]
    fn test_write_csv_blanks_nulls() {
        let mut buf = Vec::new();
        write_csv(&report().table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "Timestamp,API Name,Percentile 50,Error Rate,Total Request");
        assert_eq!(lines[1], "2024-09-08,\"GET /a, b\",1.25,12 %,100");
        assert_eq!(lines[2], "2024-09-09,\"GET /a, b\",6,,");
    }

    #[test]
    fn test_csv_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv").display().to_string();
        CsvSink { path: path.clone() }.render(&report()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_xlsx_sink_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx").display().to_string();
        let sink = XlsxSink {
            path: path.clone(),
            title: "Date Range: 2024-09-08 - 2024-09-09".to_string(),
        };
        sink.render(&report()).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report.xlsx"]);
    }

    #[test]
    fn test_xlsx_sink_removes_staging_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Saving over a directory fails after the staging CSV exists.
        let target = dir.path().join("occupied.xlsx");
        std::fs::create_dir(&target).unwrap();
        let sink = XlsxSink {
            path: target.display().to_string(),
            title: String::new(),
        };
        assert!(sink.render(&report()).is_err());

        let staging_left = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with(".report-staging-"));
        assert!(!staging_left);
    }

    #[test]
    fn test_band_of_header() {
        assert_eq!(band_of("green 50"), Some(Band::Green));
        assert_eq!(band_of("red 95"), Some(Band::Red));
        assert_eq!(band_of("Percentile 50"), None);
    }
}
