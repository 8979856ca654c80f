//! Export of the cross-date summary as CSV or JSON

use crate::metrics::Summary;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

pub const CSV_HEADER: [&str; 4] = [
    "task_name",
    "total_seconds",
    "days_count",
    "per_day_breakdown",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Export data structure for JSON
#[derive(Debug, Serialize)]
pub struct ExportData<'a> {
    pub exported_at: NaiveDateTime,
    pub total_seconds: u64,
    pub tasks: &'a Summary,
}

pub struct Exporter<'a> {
    summary: &'a Summary,
}

impl<'a> Exporter<'a> {
    pub fn new(summary: &'a Summary) -> Self {
        Self { summary }
    }

    pub fn export<W: Write>(&self, writer: W, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Csv => self.export_csv(writer),
            ExportFormat::Json => self.export_json(writer),
        }
    }

    /// One row per task in display order. The name and the breakdown are
    /// always quoted, whatever they contain; counts never are. The breakdown
    /// is `date:seconds` pairs joined by `;`.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<()> {
        // fields arrive pre-quoted, so the writer must not quote again
        let mut csv_writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Never)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        csv_writer.write_record(CSV_HEADER)?;

        for (name, task) in self.summary.sorted() {
            let breakdown = task
                .per_day
                .iter()
                .map(|(date, secs)| format!("{}:{}", date, secs))
                .collect::<Vec<_>>()
                .join(";");

            csv_writer.write_record([
                quoted(name),
                task.total_seconds.to_string(),
                task.days_count().to_string(),
                quoted(&breakdown),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn export_json<W: Write>(&self, mut writer: W) -> Result<()> {
        let export_data = ExportData {
            exported_at: Local::now().naive_local(),
            total_seconds: self.summary.total_seconds(),
            tasks: self.summary,
        };

        let json = serde_json::to_string_pretty(&export_data)?;
        writer.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.export_csv(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Wrap a text field in double quotes, doubling any quote inside it
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
