//! Body landmarks as produced by the pose estimator
//!
//! Indices follow the 33-point MediaPipe pose topology. A landmark set is
//! produced fresh for every frame and is never mutated by the analyzer.

use serde::{Deserialize, Serialize};

/// A single tracked point, normalized to the frame (`x`, `y` in `[0, 1]`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    /// A point at full confidence
    pub fn at(x: f32, y: f32) -> Self {
        Self::new(x, y, 1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Anatomical point identifiers, discriminant = index in the landmark set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyPoint {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl BodyPoint {
    pub const COUNT: usize = 33;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Pairs of points joined when drawing the skeleton overlay
pub const SKELETON: [(BodyPoint, BodyPoint); 12] = [
    (BodyPoint::LeftShoulder, BodyPoint::RightShoulder),
    (BodyPoint::LeftShoulder, BodyPoint::LeftElbow),
    (BodyPoint::LeftElbow, BodyPoint::LeftWrist),
    (BodyPoint::RightShoulder, BodyPoint::RightElbow),
    (BodyPoint::RightElbow, BodyPoint::RightWrist),
    (BodyPoint::LeftShoulder, BodyPoint::LeftHip),
    (BodyPoint::RightShoulder, BodyPoint::RightHip),
    (BodyPoint::LeftHip, BodyPoint::RightHip),
    (BodyPoint::LeftHip, BodyPoint::LeftKnee),
    (BodyPoint::LeftKnee, BodyPoint::LeftAnkle),
    (BodyPoint::RightHip, BodyPoint::RightKnee),
    (BodyPoint::RightKnee, BodyPoint::RightAnkle),
];

/// Ordered set of landmarks for one frame.
///
/// Missing entries are represented as `None` (`null` on the wire); a set
/// shorter than [`BodyPoint::COUNT`] simply has its tail absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Option<Landmark>>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Option<Landmark>>) -> Self {
        Self { points }
    }

    /// A set with every point absent, to be filled with [`LandmarkSet::with`]
    pub fn empty() -> Self {
        Self {
            points: vec![None; BodyPoint::COUNT],
        }
    }

    /// Builder-style setter, mostly useful to assemble synthetic poses
    pub fn with(mut self, point: BodyPoint, landmark: Landmark) -> Self {
        let index = point.index();
        if self.points.len() <= index {
            self.points.resize(index + 1, None);
        }
        self.points[index] = Some(landmark);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no point at all was detected
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    /// Returns the landmark if it is present, finite and at least as visible
    /// as `min_visibility`.
    pub fn point(&self, point: BodyPoint, min_visibility: f32) -> Option<Landmark> {
        let landmark = self.points.get(point.index()).copied().flatten()?;
        (landmark.is_finite() && landmark.visibility >= min_visibility).then_some(landmark)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Option<Landmark>> {
        self.points.iter()
    }
}
