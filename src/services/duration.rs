//! Total transit duration check
//!
//! The observed window runs from the first to the last event, whatever
//! their directions. For a shipment still in transit this is a lower bound
//! on the final duration, not a completion time.

use crate::domain::types::Event;
use crate::domain::verdict::{Rule, Verdict, Violation};
use chrono::TimeDelta;
use tracing::trace;

/// Default maximum transit duration, in hours
pub const DEFAULT_MAX_HOURS: u32 = 48;

/// Maximum allowed transit duration, in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DurationLimit(pub u32);

impl DurationLimit {
    #[inline]
    pub fn hours(&self) -> u32 {
        self.0
    }
}

impl Default for DurationLimit {
    fn default() -> Self {
        Self(DEFAULT_MAX_HOURS)
    }
}

/// Check that first-to-last event span stays within `max_duration`
pub fn check_total_duration(events: &[Event], max_duration: DurationLimit) -> Verdict {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Verdict::Fail(Violation::EmptyInput { rule: Rule::Duration });
    };

    let duration = last.timestamp - first.timestamp;
    trace!(duration_mins = %duration.num_minutes(), "transit_duration");

    if duration > TimeDelta::hours(i64::from(max_duration.hours())) {
        return Verdict::Fail(Violation::DurationExceeded {
            started_at: first.timestamp,
            ended_at: last.timestamp,
            hours: duration.num_hours(),
            max_hours: max_duration.hours(),
        });
    }
    Verdict::Pass
}
