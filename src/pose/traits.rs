//! Traits for pose estimation backends

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

use crate::analysis::LandmarkSet;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EstimatorError {
    /// The backend is gone; sessions relying on it cannot continue
    #[error("{0}")]
    Unavailable(String),

    /// This frame failed, the backend is still usable
    #[error("{0}")]
    Failed(String),
}

/// Anything that turns an image into body landmarks.
///
/// Implementations shared between sessions must serialize access themselves
/// or be reentrant.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// `Ok(None)` when nobody is in the frame
    async fn estimate(&self, image: &RgbImage) -> Result<Option<LandmarkSet>, EstimatorError>;

    /// Checked once when a session connects
    async fn is_available(&self) -> bool {
        true
    }

    /// Name of this backend for logging
    fn name(&self) -> &'static str;
}
