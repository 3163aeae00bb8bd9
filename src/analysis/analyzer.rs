//! Per-exercise form analysis and rep counting
//!
//! The analyzer itself holds no session state: it takes the current
//! [`AnalyzerState`] and returns the next one alongside the frame result, so
//! every session can keep its own counter without sharing anything.

use log::debug;
use std::collections::BTreeMap;

use super::geometry::angle_between;
use super::landmarks::{BodyPoint, LandmarkSet};
use super::thresholds::{
    PhaseThresholds, Thresholds, FULL_CREDIT, KNEE_DRIFT_CREDIT, MISALIGNED_CREDIT,
    PARTIAL_DEPTH_CREDIT, SHALLOW_CREDIT,
};
use super::types::{AnalysisResult, AnalyzerState, ExerciseKind, Stage};

/// Stateless scorer for the supported exercises
#[derive(Debug, Clone, Copy)]
pub struct ExerciseAnalyzer {
    min_visibility: f32,
}

impl Default for ExerciseAnalyzer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Score components and feedback collected for one frame
#[derive(Debug, Default)]
struct FrameScore {
    components: Vec<f32>,
    feedback: Vec<String>,
    angles: BTreeMap<String, f32>,
    /// Angle driving the phase machine, if the exercise has phases
    primary: Option<f32>,
}

impl FrameScore {
    fn angle(&mut self, joint: &str, degrees: f32) {
        self.angles.insert(joint.to_string(), degrees);
    }

    fn credit(&mut self, score: f32) {
        self.components.push(score);
    }

    /// Partial credit plus an advisory message, never a hard failure
    fn penalize(&mut self, score: f32, message: &str) {
        self.components.push(score);
        self.feedback.push(message.to_string());
    }

    /// Depth component shared by the cyclic exercises
    fn depth(&mut self, angle: f32, phase: &PhaseThresholds, shallow_message: &str) {
        self.primary = Some(angle);
        if angle < phase.down {
            self.credit(FULL_CREDIT);
        } else if angle < phase.partial {
            self.penalize(PARTIAL_DEPTH_CREDIT, shallow_message);
        } else {
            self.credit(SHALLOW_CREDIT);
        }
    }

    fn form_score(&self) -> u8 {
        if self.components.is_empty() {
            return 0;
        }
        let mean = self.components.iter().sum::<f32>() / self.components.len() as f32;
        mean.round().clamp(0.0, 100.0) as u8
    }
}

impl ExerciseAnalyzer {
    /// Points below `min_visibility` are treated as not detected
    pub fn new(min_visibility: f32) -> Self {
        Self {
            min_visibility: min_visibility.clamp(0.0, 1.0),
        }
    }

    /// Analyze one frame for `kind`, returning the result and the next state.
    ///
    /// Missing landmarks never fail: the frame degrades to a "No pose
    /// detected" result and the state is returned untouched.
    pub fn analyze(
        &self,
        kind: ExerciseKind,
        landmarks: Option<&LandmarkSet>,
        state: AnalyzerState,
    ) -> (AnalysisResult, AnalyzerState) {
        let scored = landmarks
            .filter(|set| !set.is_empty())
            .and_then(|set| match kind {
                ExerciseKind::Squat => self.squat(set),
                ExerciseKind::Pushup => self.pushup(set),
                ExerciseKind::Plank => self.plank(set),
            });

        let Some(frame) = scored else {
            return (AnalysisResult::no_pose(kind, state), state);
        };

        let next = match (Thresholds::for_kind(kind).phase, frame.primary) {
            (Some(phase), Some(angle)) => advance(&phase, angle, state),
            _ => state,
        };

        if next.rep_count > state.rep_count {
            debug!("{}: rep {} completed", kind, next.rep_count);
        }

        let result = AnalysisResult {
            exercise: kind,
            rep_count: next.rep_count,
            form_score: frame.form_score(),
            feedback: frame.feedback,
            angles: frame.angles,
            stage: next.stage,
        };

        (result, next)
    }

    fn squat(&self, set: &LandmarkSet) -> Option<FrameScore> {
        let hip = set.point(BodyPoint::LeftHip, self.min_visibility)?;
        let knee = set.point(BodyPoint::LeftKnee, self.min_visibility)?;
        let ankle = set.point(BodyPoint::LeftAnkle, self.min_visibility)?;
        let shoulder = set.point(BodyPoint::LeftShoulder, self.min_visibility)?;

        let thresholds = Thresholds::for_kind(ExerciseKind::Squat);
        let phase = thresholds.phase?;

        let knee_angle = angle_between(hip, knee, ankle);
        let back_angle = angle_between(shoulder, hip, knee);

        let mut frame = FrameScore::default();
        frame.angle("knee", knee_angle);
        frame.angle("back", back_angle);

        frame.depth(knee_angle, &phase, "Go deeper");

        if thresholds.alignment.contains(back_angle) {
            frame.credit(FULL_CREDIT);
        } else {
            frame.penalize(MISALIGNED_CREDIT, "Keep back straight");
        }

        // knee tracking over the ankle, only "forward" drift is worth a message
        let drift = knee.x - ankle.x;
        if drift.abs() < thresholds.knee_drift.unwrap_or(f32::INFINITY) {
            frame.credit(FULL_CREDIT);
        } else if drift > 0.0 {
            frame.penalize(KNEE_DRIFT_CREDIT, "Knees too forward");
        } else {
            frame.credit(KNEE_DRIFT_CREDIT);
        }

        Some(frame)
    }

    fn pushup(&self, set: &LandmarkSet) -> Option<FrameScore> {
        let shoulder = set.point(BodyPoint::LeftShoulder, self.min_visibility)?;
        let elbow = set.point(BodyPoint::LeftElbow, self.min_visibility)?;
        let wrist = set.point(BodyPoint::LeftWrist, self.min_visibility)?;
        let hip = set.point(BodyPoint::LeftHip, self.min_visibility)?;
        let knee = set.point(BodyPoint::LeftKnee, self.min_visibility)?;

        let thresholds = Thresholds::for_kind(ExerciseKind::Pushup);
        let phase = thresholds.phase?;

        let elbow_angle = angle_between(shoulder, elbow, wrist);
        let body_angle = angle_between(shoulder, hip, knee);

        let mut frame = FrameScore::default();
        frame.angle("elbow", elbow_angle);
        frame.angle("body", body_angle);

        frame.depth(elbow_angle, &phase, "Go lower");
        body_line(&mut frame, body_angle, thresholds);

        Some(frame)
    }

    fn plank(&self, set: &LandmarkSet) -> Option<FrameScore> {
        let shoulder = set.point(BodyPoint::LeftShoulder, self.min_visibility)?;
        let hip = set.point(BodyPoint::LeftHip, self.min_visibility)?;
        let ankle = set.point(BodyPoint::LeftAnkle, self.min_visibility)?;

        let thresholds = Thresholds::for_kind(ExerciseKind::Plank);
        let body_angle = angle_between(shoulder, hip, ankle);

        let mut frame = FrameScore::default();
        frame.angle("body", body_angle);
        body_line(&mut frame, body_angle, thresholds);

        Some(frame)
    }
}

fn body_line(frame: &mut FrameScore, body_angle: f32, thresholds: &Thresholds) {
    if thresholds.alignment.contains(body_angle) {
        frame.credit(FULL_CREDIT);
    } else if body_angle < thresholds.alignment.min {
        frame.penalize(MISALIGNED_CREDIT, "Hips too low");
    } else {
        frame.penalize(MISALIGNED_CREDIT, "Hips too high");
    }
}

/// Hysteresis step: enter `Down` below `down`, complete a rep above `up`
fn advance(phase: &PhaseThresholds, angle: f32, mut state: AnalyzerState) -> AnalyzerState {
    if angle < phase.down {
        if state.stage != Stage::Down {
            state.stage = Stage::Down;
        }
    } else if angle > phase.up && state.stage == Stage::Down {
        state.rep_count = state.rep_count.saturating_add(1);
        state.stage = Stage::Up;
    }
    state
}
