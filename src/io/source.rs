//! Record source - retrieves a shipment's events from the record store
//!
//! The rule checkers never fetch data. A `RecordSource` selects every record
//! for one company + transport identifier and returns them sorted ascending
//! by timestamp. Retrieval failures are reported as `SourceError`, which is
//! kept separate from rule verdicts so callers can tell "could not be read"
//! apart from "read and invalid".

use crate::domain::types::{Event, ShipmentKey};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Infrastructure failure while retrieving records
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("record store unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at {}:{line}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Data-access collaborator supplying event sequences
pub trait RecordSource: Send + Sync {
    /// All events for `key`, sorted ascending by timestamp
    fn fetch(&self, key: &ShipmentKey) -> Result<Vec<Event>, SourceError>;

    /// Every shipment known to the store, sorted
    fn shipments(&self) -> Result<Vec<ShipmentKey>, SourceError>;
}

/// Sort a shipment's records ascending by timestamp; ties keep store order
pub fn sort_by_time(events: &mut [Event]) {
    events.sort_by_key(|e| e.timestamp);
}

/// Record store backed by a JSON Lines file, one record per line.
///
/// The file is re-read on every call, so edits between calls are visible.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn unavailable(&self, source: std::io::Error) -> SourceError {
        SourceError::Unavailable { path: self.path.clone(), source }
    }

    /// Decode every record, calling `keep` to select which ones to retain
    fn read_records<F>(&self, mut keep: F) -> Result<Vec<Event>, SourceError>
    where
        F: FnMut(&Event) -> bool,
    {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| self.unavailable(e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(trimmed).map_err(|source| {
                SourceError::Malformed { path: self.path.clone(), line: idx + 1, source }
            })?;
            if keep(&event) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl RecordSource for JsonlSource {
    fn fetch(&self, key: &ShipmentKey) -> Result<Vec<Event>, SourceError> {
        let mut events = self.read_records(|e| e.belongs_to(key))?;
        sort_by_time(&mut events);

        if events.is_empty() {
            warn!(shipment = %key, path = %self.path.display(), "no_records_for_shipment");
        } else {
            debug!(shipment = %key, records = %events.len(), "records_fetched");
        }
        Ok(events)
    }

    fn shipments(&self) -> Result<Vec<ShipmentKey>, SourceError> {
        let mut keys = BTreeSet::new();
        self.read_records(|e| {
            keys.insert(e.key());
            false
        })?;
        debug!(shipments = %keys.len(), path = %self.path.display(), "shipments_listed");
        Ok(keys.into_iter().collect())
    }
}
