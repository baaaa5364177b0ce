//! Report rendering for the command line.

use crate::error::Result;
use crate::types::RouteCaptureReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// How a finished report is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The bare report as pretty JSON.
    Json,
    /// The bare report as YAML.
    Yaml,
    /// The report wrapped in a run envelope, as JSON.
    #[default]
    Signal,
}

/// Run envelope around a report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal<'a> {
    pub content: &'a RouteCaptureReport,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// 0 on success, 1 when the target could not be captured at all.
    pub status: u8,
    pub error_message: Option<String>,
}

impl<'a> Signal<'a> {
    pub fn new(report: &'a RouteCaptureReport, started_at: DateTime<Utc>) -> Self {
        let failure = capture_failed(report).then(|| report.errors.join("; "));
        Self {
            content: report,
            started_at,
            completed_at: Utc::now(),
            status: u8::from(failure.is_some()),
            error_message: failure,
        }
    }
}

/// A report with errors and nothing else means the capture step failed.
pub fn capture_failed(report: &RouteCaptureReport) -> bool {
    report.routes.is_empty() && report.urls.is_empty() && !report.errors.is_empty()
}

/// Render `report` in `format`.
pub fn render(
    report: &RouteCaptureReport,
    format: OutputFormat,
    started_at: DateTime<Utc>,
) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Signal => serde_json::to_string_pretty(&Signal::new(report, started_at))?,
    };
    Ok(rendered)
}

/// Write `rendered` to `path`, or stdout when no path is given.
pub fn write_output(rendered: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, format!("{rendered}\n"))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{rendered}")?;
        }
    }
    Ok(())
}
