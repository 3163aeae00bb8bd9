//! WebSocket message formats
//!
//! Every message is a JSON text frame tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, ExerciseKind, LandmarkSet};
use crate::session::SessionError;

/// Client → server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Camera frame, base64 image optionally wrapped in a data URI
    Frame { image: String },
    /// Landmarks already estimated on the client
    Landmarks { landmarks: LandmarkSet },
    /// Exercise is kept as a raw string so unknown names can be reported
    ChangeExercise { exercise: String },
    Reset,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        serde_json::from_str(text).map_err(|e| SessionError::Malformed(e.to_string()))
    }

    /// Frames may be dropped under load, control messages never are
    pub fn is_frame(&self) -> bool {
        matches!(self, ClientMessage::Frame { .. } | ClientMessage::Landmarks { .. })
    }
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Analysis {
        #[serde(flatten)]
        result: AnalysisResult,
        /// Annotated frame, only when echo is enabled
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    ExerciseChanged {
        exercise: ExerciseKind,
    },
    ResetComplete,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn analysis(result: AnalysisResult) -> Self {
        ServerMessage::Analysis { result, image: None }
    }

    pub fn error(err: &SessionError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalyzerState, Stage};
    use serde_json::{Value, json};

    #[test]
    fn test_parse_client_messages() {
        assert_eq!(
            ClientMessage::parse(r#"{"type": "frame", "image": "data:image/jpeg;base64,AAAA"}"#),
            Ok(ClientMessage::Frame {
                image: "data:image/jpeg;base64,AAAA".into()
            })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type": "change_exercise", "exercise": "lunge"}"#),
            Ok(ClientMessage::ChangeExercise {
                exercise: "lunge".into()
            })
        );
        assert_eq!(ClientMessage::parse(r#"{"type": "reset"}"#), Ok(ClientMessage::Reset));

        let landmarks = ClientMessage::parse(r#"{"type": "landmarks", "landmarks": [null, {"x": 0.1, "y": 0.2}]}"#).unwrap();
        assert!(landmarks.is_frame());
        assert!(!ClientMessage::Reset.is_frame());
    }

    #[test]
    fn test_malformed_client_messages() {
        for text in [
            "not json",
            r#"{"image": "AAAA"}"#,
            r#"{"type": "dance"}"#,
            r#"{"type": "change_exercise"}"#,
            r#"{"type": "frame", "image": 42}"#,
        ] {
            assert!(
                matches!(ClientMessage::parse(text), Err(SessionError::Malformed(_))),
                "accepted {}",
                text
            );
        }
    }

    #[test]
    fn test_analysis_shape() {
        let mut result = AnalysisResult::no_pose(ExerciseKind::Squat, AnalyzerState::default());
        result.stage = Stage::Down;
        result.angles.insert("knee".into(), 85.0);

        let value: Value = serde_json::from_str(&ServerMessage::analysis(result).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "analysis");
        assert_eq!(value["exercise"], "squat");
        assert_eq!(value["stage"], "down");
        assert_eq!(value["rep_count"], 0);
        assert_eq!(value["angles"]["knee"], 85.0);
        assert!(value.get("image").is_none());
    }

    #[test]
    fn test_control_acks() {
        let changed = serde_json::to_value(ServerMessage::ExerciseChanged {
            exercise: ExerciseKind::Pushup,
        })
        .unwrap();
        assert_eq!(changed, json!({"type": "exercise_changed", "exercise": "pushup"}));

        let reset = serde_json::to_value(ServerMessage::ResetComplete).unwrap();
        assert_eq!(reset, json!({"type": "reset_complete"}));

        let error = serde_json::to_value(ServerMessage::error(&SessionError::UnsupportedExercise("lunge".into()))).unwrap();
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().contains("lunge"));
    }
}
