//! Consistency check: time ordering and per-station in/out pairing
//!
//! One forward pass over the sequence. At every position the ordering
//! against the predecessor is checked first, then the direction token,
//! then the pairing state machine. The first violation ends the scan.
//!
//! Stations still open when the scan ends are accepted: a shipment that
//! has not yet checked out of its last station is in progress, not broken.

use crate::domain::types::{Direction, Event};
use crate::domain::verdict::{Rule, Verdict, Violation};
use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Stations with an `In` not yet matched by an `Out`, keyed by station name.
///
/// Lives for one scan only and borrows station names from the sequence.
#[derive(Debug, Default)]
pub struct OpenStations<'a> {
    open: FxHashMap<&'a str, NaiveDateTime>,
}

impl<'a> OpenStations<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check-in. Fails if the station is already open.
    pub fn open(
        &mut self,
        station: &'a str,
        at: NaiveDateTime,
        index: usize,
    ) -> Result<(), Violation> {
        if self.open.contains_key(station) {
            return Err(Violation::DuplicateIn { station: station.to_string(), index });
        }
        self.open.insert(station, at);
        Ok(())
    }

    /// Record a check-out, closing the station.
    ///
    /// Fails if the station is not open or the check-out is earlier than
    /// its own check-in.
    pub fn close(&mut self, station: &str, at: NaiveDateTime, index: usize) -> Result<(), Violation> {
        let Some(&checked_in) = self.open.get(station) else {
            return Err(Violation::OutWithoutIn { station: station.to_string(), index });
        };
        if at < checked_in {
            return Err(Violation::OutBeforeIn {
                station: station.to_string(),
                checked_in,
                checked_out: at,
            });
        }
        self.open.remove(station);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Check ordering and pairing of one shipment's events
pub fn check_consistency(events: &[Event]) -> Verdict {
    if events.is_empty() {
        return Verdict::Fail(Violation::EmptyInput { rule: Rule::Consistency });
    }
    scan(events).into()
}

fn scan(events: &[Event]) -> Result<(), Violation> {
    let mut stations = OpenStations::new();

    for (index, event) in events.iter().enumerate() {
        if index > 0 && event.timestamp < events[index - 1].timestamp {
            return Err(Violation::TimeReversal { index });
        }

        match &event.direction {
            Direction::In => stations.open(&event.station, event.timestamp, index)?,
            Direction::Out => stations.close(&event.station, event.timestamp, index)?,
            Direction::Unknown(value) => {
                return Err(Violation::MalformedDirection {
                    station: event.station.clone(),
                    value: value.clone(),
                });
            }
        }
        trace!(index = %index, station = %event.station, direction = %event.direction, "consistency_step");
    }

    if !stations.is_empty() {
        debug!(open_stations = %stations.len(), "consistency_in_progress");
    }
    Ok(())
}
