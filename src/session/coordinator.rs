//! Per-connection session state
//!
//! A `SessionCoordinator` owns the current exercise and its analyzer state
//! for exactly one live connection. It is a plain value driven by the
//! transport; nothing here is shared between sessions.

use log::info;

use crate::analysis::{AnalysisResult, AnalyzerState, ExerciseAnalyzer, ExerciseKind, LandmarkSet};
use crate::session::error::SessionError;

pub type SessionId = u64;

/// What is left of a session once it is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    pub frames: u64,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} {} reps",
            self.frames, self.rep_count, self.exercise
        )
    }
}

pub struct SessionCoordinator {
    id: SessionId,
    exercise: ExerciseKind,
    state: AnalyzerState,
    analyzer: ExerciseAnalyzer,
    frames: u64,
}

impl SessionCoordinator {
    /// New session on the default exercise with a zeroed counter
    pub fn new(id: SessionId, analyzer: ExerciseAnalyzer) -> Self {
        Self {
            id,
            exercise: ExerciseKind::default(),
            state: AnalyzerState::default(),
            analyzer,
            frames: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn exercise(&self) -> ExerciseKind {
        self.exercise
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    /// Analyze one frame. `None` means the estimator saw nobody.
    pub fn on_frame(&mut self, landmarks: Option<&LandmarkSet>) -> AnalysisResult {
        self.frames += 1;
        let (result, next) = self.analyzer.analyze(self.exercise, landmarks, self.state);
        self.state = next;
        result
    }

    /// Switch exercise. Unknown names are rejected and leave everything as is.
    pub fn on_change_exercise(&mut self, name: &str) -> Result<ExerciseKind, SessionError> {
        let kind = name
            .parse::<ExerciseKind>()
            .map_err(|e| SessionError::UnsupportedExercise(e.0))?;

        self.exercise = kind;
        self.state.reset();
        info!("Session {}: exercise changed to {}", self.id, kind);
        Ok(kind)
    }

    /// Zero the counter, keep the exercise
    pub fn on_reset(&mut self) {
        self.state.reset();
        info!("Session {}: counter reset ({})", self.id, self.exercise);
    }

    /// Tear the session down, discarding its state
    pub fn on_disconnect(self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            exercise: self.exercise,
            rep_count: self.state.rep_count,
            frames: self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::tests::{plank_pose, pushup_pose, squat_pose};
    use crate::analysis::Stage;

    fn session() -> SessionCoordinator {
        SessionCoordinator::new(1, ExerciseAnalyzer::default())
    }

    fn squat_rep(session: &mut SessionCoordinator) {
        for angle in [170.0, 80.0, 170.0] {
            session.on_frame(Some(&squat_pose(angle)));
        }
    }

    #[test]
    fn test_starts_on_squat() {
        let session = session();
        assert_eq!(session.exercise(), ExerciseKind::Squat);
        assert_eq!(session.state(), AnalyzerState::default());
    }

    #[test]
    fn test_reset_keeps_exercise() {
        let mut session = session();
        session.on_change_exercise("pushup").unwrap();
        for angle in [170.0, 80.0, 170.0, 80.0] {
            session.on_frame(Some(&pushup_pose(angle)));
        }
        assert_eq!(session.state().rep_count, 1);
        assert_eq!(session.state().stage, Stage::Down);

        session.on_reset();

        assert_eq!(session.exercise(), ExerciseKind::Pushup);
        assert_eq!(
            session.state(),
            AnalyzerState {
                rep_count: 0,
                stage: Stage::None
            }
        );
    }

    #[test]
    fn test_reset_without_frames_is_idle() {
        let mut session = session();
        session.on_reset();
        session.on_reset();
        assert_eq!(session.state(), AnalyzerState::default());
    }

    #[test]
    fn test_change_exercise_resets_state() {
        let mut session = session();
        squat_rep(&mut session);
        assert_eq!(session.state().rep_count, 1);

        assert_eq!(session.on_change_exercise("plank"), Ok(ExerciseKind::Plank));
        assert_eq!(session.state(), AnalyzerState::default());

        // a plank never counts, whatever the frames look like
        for offset in [0.0, 0.3, 0.0, -0.3, 0.0] {
            let result = session.on_frame(Some(&plank_pose(offset)));
            assert_eq!(result.rep_count, 0);
        }
        for angle in [170.0, 80.0, 170.0] {
            session.on_frame(Some(&squat_pose(angle)));
        }
        assert_eq!(session.state().rep_count, 0);
    }

    #[test]
    fn test_unsupported_exercise_leaves_state() {
        let mut session = session();
        squat_rep(&mut session);
        session.on_frame(Some(&squat_pose(80.0)));
        let before = session.state();

        let err = session.on_change_exercise("lunge").unwrap_err();
        assert_eq!(err, SessionError::UnsupportedExercise("lunge".into()));

        assert_eq!(session.exercise(), ExerciseKind::Squat);
        assert_eq!(session.state(), before);

        // no silent fallback to squat either
        assert!(session.on_change_exercise("").is_err());
        assert!(session.on_change_exercise("PUSHUP").is_err());
        assert_eq!(session.state(), before);
    }

    #[test]
    fn test_no_pose_keeps_count() {
        let mut session = session();
        squat_rep(&mut session);

        let result = session.on_frame(None);
        assert!(result.is_no_pose());
        assert_eq!(result.rep_count, 1);
        assert_eq!(session.state().rep_count, 1);
    }

    #[test]
    fn test_disconnect_summary() {
        let mut session = session();
        squat_rep(&mut session);
        session.on_frame(None);

        let summary = session.on_disconnect();
        assert_eq!(
            summary,
            SessionSummary {
                id: 1,
                exercise: ExerciseKind::Squat,
                rep_count: 1,
                frames: 4
            }
        );
    }
}
