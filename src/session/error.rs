//! Session error taxonomy

use thiserror::Error;

use crate::analysis::ExerciseKind;
use crate::pose::EstimatorError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A single inbound message could not be understood
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("Exercise '{0}' not supported. Use: {supported}", supported = ExerciseKind::supported_names())]
    UnsupportedExercise(String),

    /// The frame payload was not a decodable image
    #[error("could not decode frame: {0}")]
    Decode(String),

    /// The estimator failed on this frame but is still usable
    #[error("pose estimation failed: {0}")]
    Estimation(String),

    #[error("pose estimator unavailable: {0}")]
    EstimatorUnavailable(String),
}

impl SessionError {
    /// Fatal errors terminate the session after being reported
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::EstimatorUnavailable(_))
    }
}

impl From<EstimatorError> for SessionError {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::Unavailable(reason) => SessionError::EstimatorUnavailable(reason),
            EstimatorError::Failed(reason) => SessionError::Estimation(reason),
        }
    }
}
