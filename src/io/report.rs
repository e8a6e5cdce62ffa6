//! Report egress - writes shipment verdicts to file
//!
//! Reports are written in JSONL format (one JSON object per shipment)
//! to the file specified in config. Every line of one run shares a run_id.

use crate::services::validator::{RuleVerdict, ShipmentReport};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) run identifier
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// One JSONL line
#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    run_id: &'a str,
    checked_at: String,
    company: &'a str,
    transport_id: &'a str,
    events: usize,
    passed: bool,
    rules: &'a [RuleVerdict],
}

impl<'a> ReportLine<'a> {
    fn new(run_id: &'a str, report: &'a ShipmentReport) -> Self {
        Self {
            run_id,
            checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            company: &report.key.company,
            transport_id: &report.key.transport_id,
            events: report.event_count,
            passed: report.passed(),
            rules: &report.verdicts,
        }
    }
}

/// Egress writer for shipment reports
pub struct ReportWriter {
    file_path: String,
    run_id: String,
}

impl ReportWriter {
    pub fn new(file_path: &str, run_id: &str) -> Self {
        info!(file_path = %file_path, run_id = %run_id, "report_writer_initialized");
        Self { file_path: file_path.to_string(), run_id: run_id.to_string() }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Write a shipment report to the report file
    /// Returns true if successful, false otherwise
    pub fn write_report(&self, report: &ShipmentReport) -> bool {
        let line = match serde_json::to_string(&ReportLine::new(&self.run_id, report)) {
            Ok(line) => line,
            Err(e) => {
                error!(shipment = %report.key, error = %e, "report_encode_failed");
                return false;
            }
        };

        match self.append_line(&line) {
            Ok(()) => {
                debug!(
                    shipment = %report.key,
                    passed = %report.passed(),
                    "report_written"
                );
                true
            }
            Err(e) => {
                error!(
                    shipment = %report.key,
                    file = %self.file_path,
                    error = %e,
                    "report_write_failed"
                );
                false
            }
        }
    }

    /// Append a line to the report file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Write multiple reports, returning how many succeeded
    pub fn write_reports<'r>(&self, reports: impl IntoIterator<Item = &'r ShipmentReport>) -> usize {
        reports.into_iter().filter(|report| self.write_report(report)).count()
    }
}
