//! Domain models - core business types and verdict model
//!
//! This module contains the canonical data types used throughout the system:
//! - `Event` - one station check-in or check-out of a shipment
//! - `Direction` - in/out token, with unknown tokens preserved
//! - `ShipmentKey` - company + transport identifier
//! - `Verdict` / `Violation` - pass/fail outcome of a rule check

pub mod types;
pub mod verdict;

// Re-export commonly used types at module level
pub use types::{Direction, Event, ShipmentKey};
pub use verdict::{Rule, Verdict, Violation, ViolationKind};
