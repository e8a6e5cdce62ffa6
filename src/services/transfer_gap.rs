//! Transfer gap check: time spent outside refrigeration between stations
//!
//! Every adjacent `Out -> In` pair is one transfer, whether or not the two
//! events name the same station. Other adjacent pairs are dwell time inside
//! a station and are skipped.

use crate::domain::types::{Direction, Event};
use crate::domain::verdict::{Rule, Verdict, Violation};
use chrono::TimeDelta;
use tracing::trace;

/// Default maximum unrefrigerated transfer, in minutes
pub const DEFAULT_MAX_GAP_MINUTES: u32 = 10;

/// Maximum allowed transfer gap, in whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GapThreshold(pub u32);

impl GapThreshold {
    #[inline]
    pub fn minutes(&self) -> u32 {
        self.0
    }

    #[inline]
    fn as_delta(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.0))
    }
}

impl Default for GapThreshold {
    fn default() -> Self {
        Self(DEFAULT_MAX_GAP_MINUTES)
    }
}

/// Check that no transfer between stations exceeds `max_gap`
pub fn check_transfer_gaps(events: &[Event], max_gap: GapThreshold) -> Verdict {
    if events.is_empty() {
        return Verdict::Fail(Violation::EmptyInput { rule: Rule::TransferGap });
    }

    let limit = max_gap.as_delta();
    for pair in events.windows(2) {
        let (left, entered) = (&pair[0], &pair[1]);
        if left.direction != Direction::Out || entered.direction != Direction::In {
            continue;
        }

        let gap = entered.timestamp - left.timestamp;
        trace!(
            from = %left.station,
            to = %entered.station,
            gap_secs = %gap.num_seconds(),
            "transfer_gap"
        );
        if gap > limit {
            return Verdict::Fail(Violation::TransferGapExceeded {
                from_station: left.station.clone(),
                to_station: entered.station.clone(),
                left_at: left.timestamp,
                entered_at: entered.timestamp,
                gap_minutes: gap.num_minutes(),
                max_minutes: max_gap.minutes(),
            });
        }
    }

    Verdict::Pass
}
