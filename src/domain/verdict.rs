//! Verdict model: pass/fail outcome of a single rule check
//!
//! A failed verdict always carries a `Violation`, so "reason present iff
//! failure" holds by construction.

use crate::domain::types::fmt_ts;
use chrono::NaiveDateTime;
use serde::Serialize;

/// The three rules evaluated per shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Consistency,
    TransferGap,
    Duration,
}

impl Rule {
    pub const ALL: [Rule; 3] = [Rule::Consistency, Rule::TransferGap, Rule::Duration];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Consistency => "consistency",
            Rule::TransferGap => "transfer_gap",
            Rule::Duration => "duration",
        }
    }

    fn empty_reason(&self) -> &'static str {
        match self {
            Rule::Consistency => "no events found for this shipment",
            Rule::TransferGap | Rule::Duration => "no events present",
        }
    }
}

/// Error taxonomy for failed verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyInput,
    TemporalViolation,
    PairingViolation,
    MalformedDirection,
    ThresholdViolation,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::EmptyInput,
        ViolationKind::TemporalViolation,
        ViolationKind::PairingViolation,
        ViolationKind::MalformedDirection,
        ViolationKind::ThresholdViolation,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::EmptyInput => "empty_input",
            ViolationKind::TemporalViolation => "temporal_violation",
            ViolationKind::PairingViolation => "pairing_violation",
            ViolationKind::MalformedDirection => "malformed_direction",
            ViolationKind::ThresholdViolation => "threshold_violation",
        }
    }
}

/// First rule violation found in an event sequence.
///
/// `Display` renders the human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("{}", .rule.empty_reason())]
    EmptyInput { rule: Rule },

    /// Event at `index` is earlier than the one at `index - 1`
    #[error("temporal inconsistency: event {index} precedes event {}", .index - 1)]
    TimeReversal { index: usize },

    #[error("duplicate in without intervening out for station {station} at position {index}")]
    DuplicateIn { station: String, index: usize },

    #[error("out without preceding in for station {station} at position {index}")]
    OutWithoutIn { station: String, index: usize },

    #[error("out ({}) precedes in ({}) for station {station}", fmt_ts(.checked_out), fmt_ts(.checked_in))]
    OutBeforeIn { station: String, checked_in: NaiveDateTime, checked_out: NaiveDateTime },

    #[error("unknown direction '{value}' at station {station}")]
    MalformedDirection { station: String, value: String },

    #[error(
        "transfer gap exceeds {max_minutes} min: {from_station} (out @ {}) -> {to_station} (in @ {}) = {gap_minutes} min",
        fmt_ts(.left_at),
        fmt_ts(.entered_at)
    )]
    TransferGapExceeded {
        from_station: String,
        to_station: String,
        left_at: NaiveDateTime,
        entered_at: NaiveDateTime,
        gap_minutes: i64,
        max_minutes: u32,
    },

    #[error(
        "transit duration exceeds {max_hours}h: ~{hours}h total (from {} to {})",
        fmt_ts(.started_at),
        fmt_ts(.ended_at)
    )]
    DurationExceeded {
        started_at: NaiveDateTime,
        ended_at: NaiveDateTime,
        hours: i64,
        max_hours: u32,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::EmptyInput { .. } => ViolationKind::EmptyInput,
            Violation::TimeReversal { .. } => ViolationKind::TemporalViolation,
            Violation::DuplicateIn { .. }
            | Violation::OutWithoutIn { .. }
            | Violation::OutBeforeIn { .. } => ViolationKind::PairingViolation,
            Violation::MalformedDirection { .. } => ViolationKind::MalformedDirection,
            Violation::TransferGapExceeded { .. } | Violation::DurationExceeded { .. } => {
                ViolationKind::ThresholdViolation
            }
        }
    }
}

/// Result of one rule check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(Violation),
}

impl Verdict {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(v) => Some(v),
        }
    }

    /// Diagnostic text, present only for failures
    pub fn reason(&self) -> Option<String> {
        self.violation().map(ToString::to_string)
    }

    pub fn kind(&self) -> Option<ViolationKind> {
        self.violation().map(Violation::kind)
    }
}

impl From<Result<(), Violation>> for Verdict {
    fn from(result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Verdict::Pass,
            Err(v) => Verdict::Fail(v),
        }
    }
}

/// Wire shape: `{"ok": bool, "reason"?: string, "kind"?: string}`
#[derive(Serialize)]
struct VerdictRecord {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ViolationKind>,
}

impl Serialize for Verdict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        VerdictRecord { ok: self.is_ok(), reason: self.reason(), kind: self.kind() }
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_pass_has_no_reason() {
        assert!(Verdict::Pass.is_ok());
        assert_eq!(Verdict::Pass.reason(), None);
        assert_eq!(Verdict::Pass.kind(), None);
    }

    #[test]
    fn test_empty_input_reason_depends_on_rule() {
        let consistency = Violation::EmptyInput { rule: Rule::Consistency };
        let gap = Violation::EmptyInput { rule: Rule::TransferGap };
        assert_eq!(consistency.to_string(), "no events found for this shipment");
        assert_eq!(gap.to_string(), "no events present");
        assert_eq!(gap.kind(), ViolationKind::EmptyInput);
    }

    #[test]
    fn test_time_reversal_names_both_positions() {
        let v = Violation::TimeReversal { index: 3 };
        assert_eq!(v.to_string(), "temporal inconsistency: event 3 precedes event 2");
        assert_eq!(v.kind(), ViolationKind::TemporalViolation);
    }

    #[test]
    fn test_out_before_in_cites_both_timestamps() {
        let v = Violation::OutBeforeIn {
            station: "Hub A".to_string(),
            checked_in: ts("2024-03-01 10:00"),
            checked_out: ts("2024-03-01 09:30"),
        };
        assert_eq!(
            v.to_string(),
            "out (2024-03-01 09:30:00) precedes in (2024-03-01 10:00:00) for station Hub A"
        );
        assert_eq!(v.kind(), ViolationKind::PairingViolation);
    }

    #[test]
    fn test_gap_reason() {
        let v = Violation::TransferGapExceeded {
            from_station: "A".to_string(),
            to_station: "B".to_string(),
            left_at: ts("2024-03-01 10:00"),
            entered_at: ts("2024-03-01 10:11"),
            gap_minutes: 11,
            max_minutes: 10,
        };
        assert_eq!(
            v.to_string(),
            "transfer gap exceeds 10 min: A (out @ 2024-03-01 10:00:00) -> B (in @ 2024-03-01 10:11:00) = 11 min"
        );
    }

    #[test]
    fn test_verdict_serializes_wire_shape() {
        let fail = Verdict::Fail(Violation::MalformedDirection {
            station: "S1".to_string(),
            value: "up".to_string(),
        });
        let json = serde_json::to_value(&fail).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["reason"], "unknown direction 'up' at station S1");
        assert_eq!(json["kind"], "malformed_direction");

        let pass = serde_json::to_value(Verdict::Pass).unwrap();
        assert_eq!(pass, serde_json::json!({ "ok": true }));
    }

    #[test]
    fn test_verdict_from_result() {
        assert_eq!(Verdict::from(Ok(())), Verdict::Pass);
        let v = Violation::TimeReversal { index: 1 };
        assert_eq!(Verdict::from(Err(v.clone())), Verdict::Fail(v));
    }
}
