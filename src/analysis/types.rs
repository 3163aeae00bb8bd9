//! Core types for exercise analysis

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Exercise kinds the analyzer knows how to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    #[default]
    Squat,
    Pushup,
    Plank,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [ExerciseKind::Squat, ExerciseKind::Pushup, ExerciseKind::Plank];

    /// Wire name of this exercise
    pub fn name(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Pushup => "pushup",
            ExerciseKind::Plank => "plank",
        }
    }

    /// Whether this exercise is counted in repetitions
    pub fn counts_reps(&self) -> bool {
        match self {
            ExerciseKind::Squat | ExerciseKind::Pushup => true,
            ExerciseKind::Plank => false,
        }
    }

    /// Comma separated list of supported names, for error messages
    pub fn supported_names() -> String {
        Self::ALL.iter().map(ExerciseKind::name).collect::<Vec<_>>().join(", ")
    }
}

impl std::fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Returned when a string names no supported exercise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExercise(pub String);

impl FromStr for ExerciseKind {
    type Err = UnknownExercise;

    /// Exact, case-sensitive match; there is no fallback kind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownExercise(s.to_string()))
    }
}

/// Phase of a cyclic movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    None,
    Up,
    Down,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::None => write!(f, "none"),
            Stage::Up => write!(f, "up"),
            Stage::Down => write!(f, "down"),
        }
    }
}

/// Per-session rep counter and phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalyzerState {
    pub rep_count: u32,
    pub stage: Stage,
}

impl AnalyzerState {
    /// Zeroes the counter and the stage together
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of analyzing a single frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    pub form_score: u8,
    pub feedback: Vec<String>,
    pub angles: BTreeMap<String, f32>,
    pub stage: Stage,
}

impl AnalysisResult {
    /// Result for a frame where no usable pose was found
    pub fn no_pose(exercise: ExerciseKind, state: AnalyzerState) -> Self {
        Self {
            exercise,
            rep_count: state.rep_count,
            form_score: 0,
            feedback: vec![NO_POSE_FEEDBACK.to_string()],
            angles: BTreeMap::new(),
            stage: state.stage,
        }
    }

    pub fn is_no_pose(&self) -> bool {
        self.form_score == 0 && self.angles.is_empty() && self.feedback.iter().any(|f| f == NO_POSE_FEEDBACK)
    }
}

pub const NO_POSE_FEEDBACK: &str = "No pose detected";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exercise() {
        assert_eq!("squat".parse::<ExerciseKind>(), Ok(ExerciseKind::Squat));
        assert_eq!("pushup".parse::<ExerciseKind>(), Ok(ExerciseKind::Pushup));
        assert_eq!("plank".parse::<ExerciseKind>(), Ok(ExerciseKind::Plank));

        assert!("lunge".parse::<ExerciseKind>().is_err());
        assert!("Squat".parse::<ExerciseKind>().is_err());
        assert!("".parse::<ExerciseKind>().is_err());
    }

    #[test]
    fn test_supported_names() {
        assert_eq!(ExerciseKind::supported_names(), "squat, pushup, plank");
        assert!(!ExerciseKind::Plank.counts_reps());
    }

    #[test]
    fn test_result_serialization() {
        let mut state = AnalyzerState::default();
        state.rep_count = 2;
        let result = AnalysisResult::no_pose(ExerciseKind::Pushup, state);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exercise"], "pushup");
        assert_eq!(json["rep_count"], 2);
        assert_eq!(json["form_score"], 0);
        assert_eq!(json["stage"], "none");
        assert_eq!(json["feedback"][0], "No pose detected");
    }
}
