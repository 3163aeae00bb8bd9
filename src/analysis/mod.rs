//! Exercise form analysis
//!
//! Pure, synchronous code: no I/O and no suspension points. Consumes the
//! landmark sets produced by a [`crate::pose::PoseEstimator`] and turns them
//! into scores, feedback and rep counts.
//!
//! - `geometry`: joint angle from three points
//! - `landmarks`: anatomical point identifiers and per-frame landmark sets
//! - `thresholds`: fixed angle boundaries per exercise
//! - `analyzer`: per-exercise scoring and hysteresis rep counting

pub mod analyzer;
pub mod geometry;
pub mod landmarks;
pub mod thresholds;
pub mod types;

pub use analyzer::ExerciseAnalyzer;
pub use geometry::angle_between;
pub use landmarks::{BodyPoint, Landmark, LandmarkSet};
pub use thresholds::Thresholds;
pub use types::{AnalysisResult, AnalyzerState, ExerciseKind, Stage};
