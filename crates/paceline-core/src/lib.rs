//! Paceline Core Library
//!
//! Shared data model, merge semantics, and regression detection for the
//! Paceline project.

pub mod merge;
pub mod regression;
pub mod series;
pub mod submission;
pub mod types;

// Re-export core types
pub use types::{CommitInfo, Measurement, Record, Repository, Signature};

// Re-export submission types
pub use submission::{RunSubmission, ValidationError};

// Re-export merge types
pub use merge::{merge_record, MergeOutcome};

// Re-export series types
pub use series::{series_points, SeriesFilter, SeriesPoint};

// Re-export regression types
pub use regression::{
    evaluate, Direction, MeasurementVerdict, RegressionPolicy, Verdict,
};
