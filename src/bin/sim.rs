//! Coolchain simulation - synthetic shipment logs for local testing
//!
//! Writes station check-in/check-out records in the record store format
//! (JSONL) for named scenarios, each as its own shipment. Output is
//! deterministic for a given start time, so runs can be diffed.
//!
//! Scenarios:
//! - happy: complete route, every rule passes
//! - in-transit: last station checked in but not out yet
//! - long-gap: one transfer longer than the gap threshold
//! - overdue: route longer than the duration limit
//! - reversal: one record earlier than its predecessor
//! - duplicate-in: station checked in twice
//! - orphan-out: check-out at a station never checked in
//! - bad-direction: unrecognised direction token
//! - all: every scenario above
//!
//! Usage:
//!   cargo run --bin coolchain-sim -- --scenario all --output records.jsonl

use anyhow::Context;
use chrono::{NaiveDateTime, TimeDelta};
use clap::Parser;
use coolchain_validator::domain::types::parse_timestamp;
use coolchain_validator::domain::{Direction, Event, ShipmentKey};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const SCENARIOS: [&str; 8] = [
    "happy",
    "in-transit",
    "long-gap",
    "overdue",
    "reversal",
    "duplicate-in",
    "orphan-out",
    "bad-direction",
];

const ROUTE: [&str; 4] = ["Kuehlhaus Hildesheim", "LKW 1", "Umschlaglager Hannover", "Markt Celle"];

// ============================================================================
// CLI Args
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "coolchain-sim")]
#[command(about = "Synthetic cold-chain shipment logs for local testing")]
struct Args {
    /// Scenario to generate (see module docs), or "all"
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Output JSONL file
    #[arg(short, long, default_value = "records.jsonl")]
    output: String,

    /// Company name written on every record
    #[arg(long, default_value = "Food Solution Hildesheim")]
    company: String,

    /// First check-in time (YYYY-MM-DD HH:MM)
    #[arg(long, default_value = "2024-03-01 06:00")]
    start: String,

    /// Append to the output file instead of truncating it
    #[arg(long)]
    append: bool,
}

// ============================================================================
// Route builder
// ============================================================================

/// Builds one shipment's records step by step
struct RouteBuilder {
    key: ShipmentKey,
    clock: NaiveDateTime,
    events: Vec<Event>,
}

impl RouteBuilder {
    fn new(company: &str, transport_id: &str, start: NaiveDateTime) -> Self {
        Self { key: ShipmentKey::new(company, transport_id), clock: start, events: Vec::new() }
    }

    fn wait(mut self, minutes: i64) -> Self {
        self.clock += TimeDelta::minutes(minutes);
        self
    }

    fn push(mut self, station: &str, direction: Direction) -> Self {
        let category = if station.starts_with("LKW") { "transport" } else { "storage" };
        self.events
            .push(Event::new(&self.key, station, direction, self.clock).with_category(category));
        self
    }

    fn check_in(self, station: &str) -> Self {
        self.push(station, Direction::In)
    }

    fn check_out(self, station: &str) -> Self {
        self.push(station, Direction::Out)
    }

    /// Dwell at `station` for `dwell` minutes, then transfer for `transfer` minutes
    fn visit(self, station: &str, dwell: i64, transfer: i64) -> Self {
        self.check_in(station).wait(dwell).check_out(station).wait(transfer)
    }

    fn build(self) -> Vec<Event> {
        self.events
    }
}

fn scenario(name: &str, company: &str, start: NaiveDateTime) -> Option<Vec<Event>> {
    let transport_id = format!("SIM-{}", name.to_uppercase());
    let route = RouteBuilder::new(company, &transport_id, start);

    let events = match name {
        "happy" => route
            .visit(ROUTE[0], 120, 5)
            .visit(ROUTE[1], 240, 8)
            .visit(ROUTE[2], 600, 4)
            .visit(ROUTE[3], 30, 0)
            .build(),
        "in-transit" => route.visit(ROUTE[0], 120, 5).visit(ROUTE[1], 240, 8).check_in(ROUTE[2]).build(),
        "long-gap" => route.visit(ROUTE[0], 120, 25).visit(ROUTE[1], 240, 0).build(),
        "overdue" => route
            .visit(ROUTE[0], 120, 5)
            .visit(ROUTE[1], 48 * 60, 5)
            .visit(ROUTE[2], 60, 0)
            .build(),
        "reversal" => {
            let mut events = route.visit(ROUTE[0], 120, 5).visit(ROUTE[1], 240, 0).build();
            events[2].timestamp -= TimeDelta::hours(3);
            events
        }
        "duplicate-in" => route.check_in(ROUTE[0]).wait(30).check_in(ROUTE[0]).build(),
        "orphan-out" => route.visit(ROUTE[0], 120, 5).check_out(ROUTE[1]).build(),
        "bad-direction" => route
            .check_in(ROUTE[0])
            .wait(60)
            .push(ROUTE[0], Direction::Unknown("transit".to_string()))
            .build(),
        _ => return None,
    };
    Some(events)
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let start = parse_timestamp(&args.start)
        .with_context(|| format!("Invalid start time {}", args.start))?;

    let names: Vec<&str> =
        if args.scenario == "all" { SCENARIOS.to_vec() } else { vec![args.scenario.as_str()] };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(args.append)
        .truncate(!args.append)
        .open(&args.output)
        .with_context(|| format!("Failed to open output file {}", args.output))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for name in names {
        let events = scenario(name, &args.company, start)
            .with_context(|| format!("Unknown scenario {name} (expected one of {SCENARIOS:?} or all)"))?;
        for event in &events {
            writeln!(writer, "{}", serde_json::to_string(event)?)?;
        }
        info!(scenario = %name, transport_id = %events[0].transport_id, records = %events.len(), "scenario_written");
        written += events.len();
    }
    writer.flush()?;

    info!(output = %args.output, records = %written, "simulation_complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coolchain_validator::domain::{Rule, ViolationKind};
    use coolchain_validator::services::{validate_shipment, Thresholds};

    fn run(name: &str) -> coolchain_validator::services::ShipmentReport {
        let start = parse_timestamp("2024-03-01 06:00").unwrap();
        let events = scenario(name, "Acme", start).unwrap();
        validate_shipment(&events[0].key(), &events, Thresholds::default())
    }

    #[test]
    fn test_unknown_scenario() {
        let start = parse_timestamp("2024-03-01 06:00").unwrap();
        assert!(scenario("nope", "Acme", start).is_none());
    }

    #[test]
    fn test_passing_scenarios() {
        assert!(run("happy").passed());
        assert!(run("in-transit").passed());
    }

    #[test]
    fn test_failing_scenarios_hit_expected_rule() {
        let cases = [
            ("long-gap", Rule::TransferGap, ViolationKind::ThresholdViolation),
            ("overdue", Rule::Duration, ViolationKind::ThresholdViolation),
            ("reversal", Rule::Consistency, ViolationKind::TemporalViolation),
            ("duplicate-in", Rule::Consistency, ViolationKind::PairingViolation),
            ("orphan-out", Rule::Consistency, ViolationKind::PairingViolation),
            ("bad-direction", Rule::Consistency, ViolationKind::MalformedDirection),
        ];
        for (name, rule, kind) in cases {
            let report = run(name);
            assert_eq!(report.verdict(rule).and_then(|v| v.kind()), Some(kind), "{name}");
        }
    }
}
