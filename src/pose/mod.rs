//! Pose estimation boundary
//!
//! The estimator is an injected capability: sessions only see the
//! [`PoseEstimator`] trait, so the analysis can run on synthetic landmarks in
//! tests and on any backend in production.

pub mod decode;
pub mod overlay;
pub mod sidecar;
pub mod traits;

pub use sidecar::SidecarEstimator;
pub use traits::{EstimatorError, PoseEstimator};
