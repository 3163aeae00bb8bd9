//! Fixed angle boundaries per exercise (degrees)

use super::types::ExerciseKind;

/// Two-threshold phase detection on the primary joint angle.
///
/// Entering `Down` requires `angle < down`, completing a rep requires
/// `angle > up`; the gap between the two absorbs landmark jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    pub down: f32,
    pub up: f32,
    /// Upper bound of the "almost deep enough" band starting at `down`
    pub partial: f32,
}

/// Open interval an alignment angle must fall into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentWindow {
    pub min: f32,
    pub max: f32,
}

impl AlignmentWindow {
    #[inline]
    pub fn contains(&self, angle: f32) -> bool {
        self.min < angle && angle < self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// `None` for static holds
    pub phase: Option<PhaseThresholds>,
    pub alignment: AlignmentWindow,
    /// Max horizontal knee/ankle offset in normalized units (squat only)
    pub knee_drift: Option<f32>,
}

pub const FULL_CREDIT: f32 = 100.0;
pub const PARTIAL_DEPTH_CREDIT: f32 = 70.0;
pub const SHALLOW_CREDIT: f32 = 50.0;
pub const MISALIGNED_CREDIT: f32 = 50.0;
pub const KNEE_DRIFT_CREDIT: f32 = 60.0;

const SQUAT: Thresholds = Thresholds {
    phase: Some(PhaseThresholds {
        down: 90.0,
        up: 160.0,
        partial: 120.0,
    }),
    alignment: AlignmentWindow { min: 160.0, max: 200.0 },
    knee_drift: Some(0.1),
};

const PUSHUP: Thresholds = Thresholds {
    phase: Some(PhaseThresholds {
        down: 90.0,
        up: 160.0,
        partial: 120.0,
    }),
    alignment: AlignmentWindow { min: 160.0, max: 200.0 },
    knee_drift: None,
};

const PLANK: Thresholds = Thresholds {
    phase: None,
    alignment: AlignmentWindow { min: 165.0, max: 195.0 },
    knee_drift: None,
};

impl Thresholds {
    pub fn for_kind(kind: ExerciseKind) -> &'static Thresholds {
        match kind {
            ExerciseKind::Squat => &SQUAT,
            ExerciseKind::Pushup => &PUSHUP,
            ExerciseKind::Plank => &PLANK,
        }
    }
}
