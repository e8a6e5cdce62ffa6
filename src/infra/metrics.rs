//! Lock-free validation metrics and periodic reporting
//!
//! Counters are plain atomics updated from any worker without locking.
//! `report()` swaps the windowed values to zero and returns a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only and must not drive validation logic.

use crate::domain::verdict::{Rule, ViolationKind};
use crate::services::validator::ShipmentReport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, ≤5120, >5120
const BUCKET_BOUNDS: [u64; 10] = [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];
const NUM_BUCKETS: usize = 11;

/// Upper bounds reported for each bucket (last bucket uses 2x the previous bound)
const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
    [10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120, 10240];

const NUM_RULES: usize = Rule::ALL.len();
const NUM_KINDS: usize = ViolationKind::ALL.len();

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

#[inline]
fn rule_index(rule: Rule) -> usize {
    match rule {
        Rule::Consistency => 0,
        Rule::TransferGap => 1,
        Rule::Duration => 2,
    }
}

#[inline]
fn kind_index(kind: ViolationKind) -> usize {
    match kind {
        ViolationKind::EmptyInput => 0,
        ViolationKind::TemporalViolation => 1,
        ViolationKind::PairingViolation => 2,
        ViolationKind::MalformedDirection => 3,
        ViolationKind::ThresholdViolation => 4,
    }
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].swap(0, Ordering::Relaxed))
}

#[inline]
fn load_all<const N: usize>(counters: &[AtomicU64; N]) -> [u64; N] {
    std::array::from_fn(|i| counters[i].load(Ordering::Relaxed))
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;
    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Shipments validated (monotonic)
    shipments_total: AtomicU64,
    /// Shipments with every rule passing (monotonic)
    shipments_passed: AtomicU64,
    /// Shipments with at least one failing rule (monotonic)
    shipments_failed: AtomicU64,
    /// Failures per rule, indexed like `Rule::ALL` (monotonic)
    rule_failures: [AtomicU64; NUM_RULES],
    /// Failures per violation kind, indexed like `ViolationKind::ALL` (monotonic)
    kind_failures: [AtomicU64; NUM_KINDS],
    /// Events scanned across all shipments (monotonic)
    events_total: AtomicU64,
    /// Record source failures (monotonic)
    source_errors: AtomicU64,
    /// Report write failures (monotonic)
    report_write_errors: AtomicU64,
    /// Shipments since last report (reset on report)
    shipments_since_report: AtomicU64,
    /// Validation latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of validation latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max validation latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            shipments_total: AtomicU64::new(0),
            shipments_passed: AtomicU64::new(0),
            shipments_failed: AtomicU64::new(0),
            rule_failures: std::array::from_fn(|_| AtomicU64::new(0)),
            kind_failures: std::array::from_fn(|_| AtomicU64::new(0)),
            events_total: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            report_write_errors: AtomicU64::new(0),
            shipments_since_report: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record one validated shipment (lock-free)
    pub fn record_shipment(&self, report: &ShipmentReport) {
        self.shipments_total.fetch_add(1, Ordering::Relaxed);
        self.shipments_since_report.fetch_add(1, Ordering::Relaxed);
        self.events_total.fetch_add(report.event_count as u64, Ordering::Relaxed);

        if report.passed() {
            self.shipments_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.shipments_failed.fetch_add(1, Ordering::Relaxed);
        }

        for failure in report.failures() {
            self.rule_failures[rule_index(failure.rule)].fetch_add(1, Ordering::Relaxed);
            if let Some(kind) = failure.verdict.kind() {
                self.kind_failures[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
            }
        }

        let latency_us = report.elapsed.as_micros() as u64;
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_report_write_error(&self) {
        self.report_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn shipments_total(&self) -> u64 {
        self.shipments_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn shipments_failed(&self) -> u64 {
        self.shipments_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn source_errors(&self) -> u64 {
        self.source_errors.load(Ordering::Relaxed)
    }

    pub fn rule_failures(&self, rule: Rule) -> u64 {
        self.rule_failures[rule_index(rule)].load(Ordering::Relaxed)
    }

    pub fn kind_failures(&self, kind: ViolationKind) -> u64 {
        self.kind_failures[kind_index(kind)].load(Ordering::Relaxed)
    }

    /// Snapshot counters; windowed values are reset
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let secs = now.duration_since(*last).as_secs_f64();
            *last = now;
            secs
        };

        let window_shipments = self.shipments_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.latency_max_us.swap(0, Ordering::Relaxed);
        let buckets = swap_buckets(&self.latency_buckets);

        MetricsSummary {
            shipments_total: self.shipments_total.load(Ordering::Relaxed),
            shipments_passed: self.shipments_passed.load(Ordering::Relaxed),
            shipments_failed: self.shipments_failed.load(Ordering::Relaxed),
            events_total: self.events_total.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            report_write_errors: self.report_write_errors.load(Ordering::Relaxed),
            rule_failures: load_all(&self.rule_failures),
            kind_failures: load_all(&self.kind_failures),
            shipments_per_sec: if elapsed_secs > 0.0 {
                window_shipments as f64 / elapsed_secs
            } else {
                0.0
            },
            avg_latency_us: if window_shipments > 0 { latency_sum / window_shipments } else { 0 },
            max_latency_us: latency_max,
            lat_p50_us: percentile_from_buckets(&buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&buckets, 0.99),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub shipments_total: u64,
    pub shipments_passed: u64,
    pub shipments_failed: u64,
    pub events_total: u64,
    pub source_errors: u64,
    pub report_write_errors: u64,
    /// Indexed like `Rule::ALL`
    pub rule_failures: [u64; NUM_RULES],
    /// Indexed like `ViolationKind::ALL`
    pub kind_failures: [u64; NUM_KINDS],
    pub shipments_per_sec: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            shipments_total = %self.shipments_total,
            passed = %self.shipments_passed,
            failed = %self.shipments_failed,
            events_total = %self.events_total,
            source_errors = %self.source_errors,
            report_write_errors = %self.report_write_errors,
            consistency_failures = %self.rule_failures[0],
            transfer_gap_failures = %self.rule_failures[1],
            duration_failures = %self.rule_failures[2],
            empty_input = %self.kind_failures[0],
            temporal_violations = %self.kind_failures[1],
            pairing_violations = %self.kind_failures[2],
            malformed_directions = %self.kind_failures[3],
            threshold_violations = %self.kind_failures[4],
            shipments_per_sec = format!("{:.1}", self.shipments_per_sec),
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{parse_timestamp, Event, ShipmentKey};
    use crate::services::validator::{validate_shipment, Thresholds};

    fn report_for(events: &[Event]) -> ShipmentReport {
        validate_shipment(&ShipmentKey::new("c", "t"), events, Thresholds::default())
    }

    fn ev(station: &str, direction: &str, at: &str) -> Event {
        let key = ShipmentKey::new("c", "t");
        Event::new(&key, station, direction.parse().unwrap(), parse_timestamp(at).unwrap())
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(10), 0);
        assert_eq!(bucket_index(11), 1);
        assert_eq!(bucket_index(5120), 9);
        assert_eq!(bucket_index(999_999), 10);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile_from_buckets(&[0; NUM_BUCKETS], 0.99), 0);
    }

    #[test]
    fn test_percentile_single_bucket() {
        let mut buckets = [0; NUM_BUCKETS];
        buckets[3] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.5), 80);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 80);
    }

    #[test]
    fn test_record_passing_and_failing_shipments() {
        let metrics = Metrics::new();
        metrics.record_shipment(&report_for(&[ev("A", "in", "2024-03-01 10:00")]));
        metrics.record_shipment(&report_for(&[]));

        assert_eq!(metrics.shipments_total(), 2);
        assert_eq!(metrics.shipments_failed(), 1);
        assert_eq!(metrics.rule_failures(Rule::Consistency), 1);
        assert_eq!(metrics.rule_failures(Rule::TransferGap), 1);
        assert_eq!(metrics.rule_failures(Rule::Duration), 1);
        assert_eq!(metrics.kind_failures(ViolationKind::EmptyInput), 3);
        assert_eq!(metrics.kind_failures(ViolationKind::ThresholdViolation), 0);
    }

    #[test]
    fn test_report_resets_window_only() {
        let metrics = Metrics::new();
        metrics.record_shipment(&report_for(&[ev("A", "in", "2024-03-01 10:00")]));
        metrics.record_source_error();

        let first = metrics.report();
        assert_eq!(first.shipments_total, 1);
        assert_eq!(first.shipments_passed, 1);
        assert_eq!(first.events_total, 1);
        assert_eq!(first.source_errors, 1);
        assert!(first.lat_p50_us > 0);

        let second = metrics.report();
        assert_eq!(second.shipments_total, 1);
        assert_eq!(second.max_latency_us, 0);
        assert_eq!(second.lat_p99_us, 0);
    }

    #[test]
    fn test_summary_carries_kind_failures() {
        let metrics = Metrics::new();
        metrics.record_shipment(&report_for(&[ev("A", "IN", "2024-03-01 10:00")]));

        let summary = metrics.report();
        let malformed = ViolationKind::ALL
            .iter()
            .position(|&k| k == ViolationKind::MalformedDirection)
            .unwrap();
        assert_eq!(summary.kind_failures[malformed], 1);
        assert_eq!(summary.kind_failures.iter().sum::<u64>(), 1);
        summary.log();
    }

    #[test]
    fn test_update_atomic_max() {
        let max = AtomicU64::new(5);
        update_atomic_max(&max, 3);
        assert_eq!(max.load(Ordering::Relaxed), 5);
        update_atomic_max(&max, 9);
        assert_eq!(max.load(Ordering::Relaxed), 9);
    }
}
