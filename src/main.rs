//! Coolchain validator - rule checks for cold-chain shipment event logs
//!
//! Loads station check-in/check-out records for one shipment (or every
//! shipment in the record store), runs the consistency, transfer gap and
//! total duration rules, and reports a verdict per rule.
//!
//! Module structure:
//! - `domain/` - Core types (Event, Direction, Verdict)
//! - `services/` - Rule checkers, composition, batch runner
//! - `io/` - Record source and report egress
//! - `infra/` - Config and metrics
//!
//! Exit codes: 0 all shipments valid, 1 at least one shipment invalid,
//! 2 records could not be retrieved.

use clap::Parser;
use coolchain_validator::domain::ShipmentKey;
use coolchain_validator::infra::{Config, Metrics};
use coolchain_validator::io::report::new_run_id;
use coolchain_validator::io::{JsonlSource, RecordSource, ReportWriter};
use coolchain_validator::services::{validate_batch, BatchOutcome};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// All shipments passed every rule
const EXIT_VALID: u8 = 0;
/// At least one shipment failed a rule
const EXIT_INVALID: u8 = 1;
/// Records could not be retrieved
const EXIT_INFRA: u8 = 2;

/// Coolchain validator - cold-chain event log rule checks
#[derive(Parser, Debug)]
#[command(name = "coolchain-validator", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Company owning the shipment
    #[arg(long, requires = "transport", required_unless_present = "all")]
    company: Option<String>,

    /// Transport identifier of the shipment
    #[arg(short, long, requires = "company")]
    transport: Option<String>,

    /// Validate every shipment in the record store
    #[arg(short, long, conflicts_with_all = ["company", "transport"])]
    all: bool,

    /// Record store (JSONL), overrides [source] path
    #[arg(short, long)]
    records: Option<String>,

    /// Maximum transfer gap in minutes, overrides [thresholds]
    #[arg(long)]
    max_gap_minutes: Option<u32>,

    /// Maximum transit duration in hours, overrides [thresholds]
    #[arg(long)]
    max_hours: Option<u32>,

    /// Report file (JSONL), overrides [report] file
    #[arg(long)]
    report: Option<String>,

    /// Do not write the JSONL report
    #[arg(long)]
    no_report: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(path) = &self.records {
            config = config.with_source_path(path);
        }
        if let Some(minutes) = self.max_gap_minutes {
            config = config.with_max_gap_minutes(minutes);
        }
        if let Some(hours) = self.max_hours {
            config = config.with_max_hours(hours);
        }
        if let Some(file) = &self.report {
            config = config.with_report_file(file);
        }
        if self.no_report {
            config = config.without_report();
        }
        config
    }
}

fn print_outcome(outcome: &BatchOutcome) {
    match &outcome.result {
        Ok(report) => {
            let status = if report.passed() { "PASS" } else { "FAIL" };
            println!("{status} {} ({} events)", report.key, report.event_count);
            for reason in report.reasons() {
                println!("    - {reason}");
            }
        }
        Err(e) => println!("ERROR {}: {e}", outcome.key),
    }
}

fn exit_code(outcomes: &[BatchOutcome]) -> u8 {
    if outcomes.iter().any(|o| o.result.is_err()) {
        EXIT_INFRA
    } else if outcomes.iter().all(BatchOutcome::passed) {
        EXIT_VALID
    } else {
        EXIT_INVALID
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Default: INFO, use RUST_LOG=debug for per-rule failure detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "coolchain_validator_starting");

    let config = args.apply(Config::load_from_path(&args.config));
    let thresholds = config.thresholds();
    info!(
        config_file = %config.config_file(),
        source = %config.source_path(),
        max_gap_minutes = %config.max_gap_minutes(),
        max_hours = %config.max_hours(),
        report_enabled = %config.report_enabled(),
        report_file = %config.report_file(),
        max_concurrency = %config.max_concurrency(),
        "config_loaded"
    );

    let source: Arc<dyn RecordSource> = Arc::new(JsonlSource::new(config.source_path()));
    let metrics = Arc::new(Metrics::new());

    let keys = match (&args.company, &args.transport) {
        (Some(company), Some(transport)) => vec![ShipmentKey::new(company, transport)],
        _ => {
            let listing = Arc::clone(&source);
            match tokio::task::spawn_blocking(move || listing.shipments()).await {
                Ok(Ok(keys)) => keys,
                Ok(Err(e)) => {
                    metrics.record_source_error();
                    error!(error = %e, "source_error");
                    println!("ERROR {e}");
                    return ExitCode::from(EXIT_INFRA);
                }
                Err(e) => {
                    error!(error = %e, "shipment_listing_failed");
                    return ExitCode::from(EXIT_INFRA);
                }
            }
        }
    };

    let outcomes =
        validate_batch(source, keys, thresholds, Arc::clone(&metrics), config.max_concurrency())
            .await;

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    if config.report_enabled() {
        let writer = ReportWriter::new(config.report_file(), &new_run_id());
        let reports: Vec<_> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
        let written = writer.write_reports(reports.iter().copied());
        for _ in written..reports.len() {
            metrics.record_report_write_error();
        }
        info!(run_id = %writer.run_id(), written = %written, "reports_written");
    }

    metrics.report().log();

    let code = exit_code(&outcomes);
    info!(exit_code = %code, "coolchain_validator_done");
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coolchain_validator::services::BatchError;
    use coolchain_validator::services::{validate_shipment, Thresholds};

    #[test]
    fn test_config_path_sources() {
        // Only test in this binary touching CONFIG_FILE
        std::env::remove_var("CONFIG_FILE");
        let args = Args::try_parse_from(["coolchain-validator", "--all"]).unwrap();
        assert_eq!(args.config, "config/dev.toml");

        std::env::set_var("CONFIG_FILE", "/etc/coolchain/strict.toml");
        let args = Args::try_parse_from(["coolchain-validator", "--all"]).unwrap();
        assert_eq!(args.config, "/etc/coolchain/strict.toml");

        let args =
            Args::try_parse_from(["coolchain-validator", "--all", "--config", "local.toml"]).unwrap();
        assert_eq!(args.config, "local.toml");
        std::env::remove_var("CONFIG_FILE");
    }

    #[test]
    fn test_shipment_selection_is_required() {
        assert!(Args::try_parse_from(["coolchain-validator"]).is_err());
        assert!(Args::try_parse_from(["coolchain-validator", "--company", "Acme"]).is_err());
        assert!(Args::try_parse_from(["coolchain-validator", "--all", "--transport", "1"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let key = ShipmentKey::new("Acme", "1");
        let failed = BatchOutcome {
            key: key.clone(),
            result: Ok(validate_shipment(&key, &[], Thresholds::default())),
        };
        let crashed = BatchOutcome {
            key: key.clone(),
            result: Err(BatchError::Task("panicked".to_string())),
        };

        assert_eq!(exit_code(&[]), EXIT_VALID);
        assert_eq!(exit_code(std::slice::from_ref(&failed)), EXIT_INVALID);
        assert_eq!(exit_code(&[failed, crashed]), EXIT_INFRA);
    }
}
