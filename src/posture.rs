// src/posture.rs - Per-exercise plausibility checks run before any angle is trusted
use tracing::debug;

use crate::geometry::joint_angle;
use crate::landmarks::{Joint, PoseLandmarks, Side};

pub const BICEP_CURL_VISIBILITY: f64 = 0.75;
pub const SHOULDER_SWING_LIMIT: f64 = 45.0;

pub const CRUNCH_VISIBILITY: f64 = 0.7;
pub const LYING_DOWN_THRESHOLD: f64 = 0.6;
pub const KNEE_BENT_THRESHOLD: f64 = 130.0;

pub const HORIZONTAL_POSE_TOLERANCE: f64 = 0.2;

pub const SQUAT_VISIBILITY: f64 = 0.7;
pub const FEET_ON_GROUND_THRESHOLD: f64 = 0.8;

/// Gate thresholds, one variant per exercise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostureGate {
    BicepCurl { visibility: f64, swing_limit: f64 },
    Crunch { visibility: f64, lying_down: f64, knee_bent: f64 },
    Pushup { horizontal_tolerance: f64 },
    Pullup,
    Squat { visibility: f64, feet_on_ground: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Neither side cleared the visibility check.
    NoVisibleSide,
    /// A side was chosen but the body does not look like the exercise.
    Implausible(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Accepted(Side),
    Rejected(Rejection),
}

impl PostureGate {
    pub fn evaluate(&self, landmarks: &PoseLandmarks) -> GateOutcome {
        let Some(side) = self.select_side(landmarks) else {
            return GateOutcome::Rejected(Rejection::NoVisibleSide);
        };

        if self.is_plausible(landmarks, side) {
            GateOutcome::Accepted(side)
        } else {
            debug!(?side, gate = ?self, "posture rejected");
            GateOutcome::Rejected(Rejection::Implausible(side))
        }
    }

    pub fn select_side(&self, landmarks: &PoseLandmarks) -> Option<Side> {
        match *self {
            PostureGate::BicepCurl { visibility, .. } => {
                let left = landmarks.visibility(Joint::LeftShoulder);
                let right = landmarks.visibility(Joint::RightShoulder);
                if left > visibility || right > visibility {
                    Some(if left >= right { Side::Left } else { Side::Right })
                } else {
                    None
                }
            }
            PostureGate::Crunch { visibility, .. } => {
                select_fully_visible(landmarks, visibility, |s| [s.shoulder(), s.hip(), s.knee()])
            }
            PostureGate::Squat { visibility, .. } => {
                select_fully_visible(landmarks, visibility, |s| [s.hip(), s.knee(), s.ankle()])
            }
            PostureGate::Pushup { .. } | PostureGate::Pullup => Some(Side::Left),
        }
    }

    pub fn is_plausible(&self, landmarks: &PoseLandmarks, side: Side) -> bool {
        let shoulder = &landmarks[side.shoulder()];
        let hip = &landmarks[side.hip()];

        match *self {
            PostureGate::BicepCurl { swing_limit, .. } => {
                if shoulder.y >= hip.y {
                    return false;
                }
                // Upper arm stays close to the torso.
                joint_angle(hip.point(), shoulder.point(), landmarks.point(side.elbow()))
                    .map(|swing| swing <= swing_limit)
                    .unwrap_or(false)
            }
            PostureGate::Crunch { lying_down, knee_bent, .. } => {
                if !(shoulder.y > lying_down && hip.y > lying_down) {
                    return false;
                }
                joint_angle(
                    hip.point(),
                    landmarks.point(side.knee()),
                    landmarks.point(side.ankle()),
                )
                .map(|knee| knee < knee_bent)
                .unwrap_or(false)
            }
            PostureGate::Pushup { horizontal_tolerance } => {
                let ankle = &landmarks[side.ankle()];
                (shoulder.y - hip.y).abs() <= horizontal_tolerance
                    && (hip.y - ankle.y).abs() <= horizontal_tolerance
            }
            PostureGate::Pullup => {
                let wrist = &landmarks[side.wrist()];
                wrist.y < shoulder.y && shoulder.y < hip.y
            }
            PostureGate::Squat { feet_on_ground, .. } => {
                shoulder.y < hip.y && landmarks[side.ankle()].y > feet_on_ground
            }
        }
    }
}

fn select_fully_visible<F>(landmarks: &PoseLandmarks, threshold: f64, joints: F) -> Option<Side>
where
    F: Fn(Side) -> [Joint; 3],
{
    let visible = |side| {
        joints(side)
            .iter()
            .all(|&joint| landmarks.visibility(joint) > threshold)
    };

    if visible(Side::Left) {
        Some(Side::Left)
    } else if visible(Side::Right) {
        Some(Side::Right)
    } else {
        None
    }
}
