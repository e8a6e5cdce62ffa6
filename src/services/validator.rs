//! Runs all rules over one shipment and combines their verdicts
//!
//! The checkers know nothing about each other; combining them (logical AND
//! for pass/fail, rule-prefixed reasons for reports) happens only here.

use crate::domain::types::{Event, ShipmentKey};
use crate::domain::verdict::{Rule, Verdict};
use crate::services::consistency::check_consistency;
use crate::services::duration::{check_total_duration, DurationLimit};
use crate::services::transfer_gap::{check_transfer_gaps, GapThreshold};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-call thresholds for the threshold rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_gap: GapThreshold,
    pub max_duration: DurationLimit,
}

impl Thresholds {
    pub fn new(max_gap_minutes: u32, max_hours: u32) -> Self {
        Self { max_gap: GapThreshold(max_gap_minutes), max_duration: DurationLimit(max_hours) }
    }
}

/// Verdict of one rule within a shipment report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    pub rule: Rule,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// All verdicts for one shipment, in rule order
#[derive(Debug, Clone)]
pub struct ShipmentReport {
    pub key: ShipmentKey,
    pub event_count: usize,
    pub verdicts: SmallVec<[RuleVerdict; 3]>,
    pub elapsed: Duration,
}

impl ShipmentReport {
    /// True only if every rule passed
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.verdict.is_ok())
    }

    pub fn verdict(&self, rule: Rule) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.rule == rule).map(|v| &v.verdict)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleVerdict> {
        self.verdicts.iter().filter(|v| !v.verdict.is_ok())
    }

    /// Failing reasons as `rule: reason`
    pub fn reasons(&self) -> Vec<String> {
        self.failures()
            .filter_map(|v| v.verdict.reason().map(|r| format!("{}: {r}", v.rule.as_str())))
            .collect()
    }
}

fn run_rule(rule: Rule, events: &[Event], thresholds: Thresholds) -> Verdict {
    match rule {
        Rule::Consistency => check_consistency(events),
        Rule::TransferGap => check_transfer_gaps(events, thresholds.max_gap),
        Rule::Duration => check_total_duration(events, thresholds.max_duration),
    }
}

fn build_report(
    key: &ShipmentKey,
    events: &[Event],
    verdicts: SmallVec<[RuleVerdict; 3]>,
    started: Instant,
) -> ShipmentReport {
    let report = ShipmentReport {
        key: key.clone(),
        event_count: events.len(),
        verdicts,
        elapsed: started.elapsed(),
    };

    for failure in report.failures() {
        debug!(
            shipment = %key,
            rule = %failure.rule.as_str(),
            kind = ?failure.verdict.kind(),
            reason = ?failure.verdict.reason(),
            "rule_failed"
        );
    }
    info!(
        shipment = %key,
        events = %report.event_count,
        passed = %report.passed(),
        elapsed_us = %report.elapsed.as_micros(),
        "shipment_validated"
    );
    report
}

/// Run every rule sequentially over one shipment's events
pub fn validate_shipment(
    key: &ShipmentKey,
    events: &[Event],
    thresholds: Thresholds,
) -> ShipmentReport {
    let started = Instant::now();
    let verdicts: SmallVec<[RuleVerdict; 3]> = Rule::ALL
        .iter()
        .map(|&rule| RuleVerdict { rule, verdict: run_rule(rule, events, thresholds) })
        .collect();
    build_report(key, events, verdicts, started)
}

/// Run every rule on its own scoped thread over the same borrowed events.
///
/// Produces the same report as [`validate_shipment`].
pub fn validate_shipment_concurrent(
    key: &ShipmentKey,
    events: &[Event],
    thresholds: Thresholds,
) -> ShipmentReport {
    let started = Instant::now();
    let verdicts: SmallVec<[RuleVerdict; 3]> = std::thread::scope(|scope| {
        let handles: SmallVec<[_; 3]> = Rule::ALL
            .iter()
            .map(|&rule| (rule, scope.spawn(move || run_rule(rule, events, thresholds))))
            .collect();

        handles
            .into_iter()
            .map(|(rule, handle)| {
                // Checkers never panic; fall back to a sequential run if one did
                let verdict = handle.join().unwrap_or_else(|_| run_rule(rule, events, thresholds));
                RuleVerdict { rule, verdict }
            })
            .collect()
    });
    build_report(key, events, verdicts, started)
}
