//! Services - rule evaluation and composition
//!
//! This module contains the core business logic:
//! - `consistency` - Time ordering and per-station in/out pairing
//! - `transfer_gap` - Maximum unrefrigerated time between stations
//! - `duration` - Maximum total transit duration
//! - `validator` - Runs all rules for one shipment and combines verdicts
//! - `batch` - Concurrent validation of many shipments

pub mod batch;
pub mod consistency;
pub mod duration;
pub mod transfer_gap;
pub mod validator;

// Re-export commonly used types
pub use batch::{validate_batch, BatchError, BatchOutcome};
pub use consistency::check_consistency;
pub use duration::{check_total_duration, DurationLimit};
pub use transfer_gap::{check_transfer_gaps, GapThreshold};
pub use validator::{validate_shipment, validate_shipment_concurrent, ShipmentReport, Thresholds};
