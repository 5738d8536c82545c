// src/landmarks.rs - Pose landmark layout shared by the provider and the engine
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::LandmarkError;

/// Number of points in a pose detection (MediaPipe pose layout).
pub const POSE_LANDMARK_COUNT: usize = 33;

/// A single detected point. `x`/`y` are image-normalized, `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, z: 0.0, visibility }
    }

    pub fn point(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const fn index(self) -> usize {
        match self {
            Joint::LeftShoulder => 11,
            Joint::RightShoulder => 12,
            Joint::LeftElbow => 13,
            Joint::RightElbow => 14,
            Joint::LeftWrist => 15,
            Joint::RightWrist => 16,
            Joint::LeftHip => 23,
            Joint::RightHip => 24,
            Joint::LeftKnee => 25,
            Joint::RightKnee => 26,
            Joint::LeftAnkle => 27,
            Joint::RightAnkle => 28,
        }
    }
}

/// Body side used for one frame's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn shoulder(self) -> Joint {
        match self {
            Side::Left => Joint::LeftShoulder,
            Side::Right => Joint::RightShoulder,
        }
    }

    pub fn elbow(self) -> Joint {
        match self {
            Side::Left => Joint::LeftElbow,
            Side::Right => Joint::RightElbow,
        }
    }

    pub fn wrist(self) -> Joint {
        match self {
            Side::Left => Joint::LeftWrist,
            Side::Right => Joint::RightWrist,
        }
    }

    pub fn hip(self) -> Joint {
        match self {
            Side::Left => Joint::LeftHip,
            Side::Right => Joint::RightHip,
        }
    }

    pub fn knee(self) -> Joint {
        match self {
            Side::Left => Joint::LeftKnee,
            Side::Right => Joint::RightKnee,
        }
    }

    pub fn ankle(self) -> Joint {
        match self {
            Side::Left => Joint::LeftAnkle,
            Side::Right => Joint::RightAnkle,
        }
    }
}

/// One full pose detection. The index set never changes between frames;
/// "nothing detected" is represented by the absence of this value.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
    points: [Landmark; POSE_LANDMARK_COUNT],
}

impl PoseLandmarks {
    pub fn from_slice(points: &[Landmark]) -> Result<Self, LandmarkError> {
        let points: [Landmark; POSE_LANDMARK_COUNT] =
            points.try_into().map_err(|_| LandmarkError::WrongCount {
                expected: POSE_LANDMARK_COUNT,
                actual: points.len(),
            })?;
        Ok(Self { points })
    }

    /// Every point at the origin with the given visibility.
    pub fn uniform(visibility: f64) -> Self {
        Self {
            points: [Landmark::new(0.0, 0.0, visibility); POSE_LANDMARK_COUNT],
        }
    }

    pub fn set(&mut self, joint: Joint, landmark: Landmark) {
        self.points[joint.index()] = landmark;
    }

    pub fn point(&self, joint: Joint) -> Vector2<f64> {
        self[joint].point()
    }

    pub fn visibility(&self, joint: Joint) -> f64 {
        self[joint].visibility
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.points
    }
}

impl Index<Joint> for PoseLandmarks {
    type Output = Landmark;

    fn index(&self, joint: Joint) -> &Landmark {
        &self.points[joint.index()]
    }
}

impl Serialize for PoseLandmarks {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.points.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PoseLandmarks {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let points = Vec::<Landmark>::deserialize(deserializer)?;
        PoseLandmarks::from_slice(&points).map_err(serde::de::Error::custom)
    }
}
