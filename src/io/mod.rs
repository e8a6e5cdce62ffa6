//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `source` - Record store access (the data-access collaborator)
//! - `report` - Shipment report output to file (JSONL format)

pub mod report;
pub mod source;

// Re-export commonly used types
pub use report::ReportWriter;
pub use source::{JsonlSource, RecordSource, SourceError};
