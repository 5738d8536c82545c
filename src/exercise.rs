// src/exercise.rs - Exercise definitions and the per-frame analysis engine
use tracing::debug;

use crate::geometry::joint_angle;
use crate::landmarks::{Joint, PoseLandmarks, Side};
use crate::posture::{self, GateOutcome, PostureGate};
use crate::reps::{AnalysisResult, Phase, Position, RepState, RepStateMachine};

pub const BICEP_CURL_ANGLE_UP: f64 = 65.0;
pub const BICEP_CURL_ANGLE_DOWN: f64 = 160.0;

/// Torso-thigh angle.
pub const CRUNCH_ANGLE_UP: f64 = 75.0;
pub const CRUNCH_ANGLE_DOWN: f64 = 100.0;

pub const PUSHUP_ELBOW_ANGLE_UP: f64 = 160.0;
pub const PUSHUP_ELBOW_ANGLE_DOWN: f64 = 70.0;

pub const PULLUP_ELBOW_ANGLE_UP: f64 = 60.0;
pub const PULLUP_ELBOW_ANGLE_DOWN: f64 = 160.0;

pub const SQUAT_KNEE_ANGLE_UP: f64 = 160.0;
pub const SQUAT_KNEE_ANGLE_DOWN: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exercise {
    BicepCurl,
    Crunch,
    Pushup,
    Pullup,
    Squat,
}

/// Fixed thresholds of one exercise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseConfig {
    pub angle_up: f64,
    pub angle_down: f64,
    pub gate: PostureGate,
    pub initial_phase: Option<Phase>,
}

impl Exercise {
    pub const ALL: [Exercise; 5] = [
        Exercise::BicepCurl,
        Exercise::Crunch,
        Exercise::Pushup,
        Exercise::Pullup,
        Exercise::Squat,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Exercise::BicepCurl => "bicepcurl",
            Exercise::Crunch => "crunch",
            Exercise::Pushup => "pushup",
            Exercise::Pullup => "pullup",
            Exercise::Squat => "squat",
        }
    }

    /// Case-insensitive lookup. Only the registry should need this.
    pub fn from_id(id: &str) -> Option<Exercise> {
        match id.trim().to_ascii_lowercase().as_str() {
            "bicepcurl" | "bicep_curl" | "bicep-curl" => Some(Exercise::BicepCurl),
            "crunch" => Some(Exercise::Crunch),
            "pushup" => Some(Exercise::Pushup),
            "pullup" => Some(Exercise::Pullup),
            "squat" => Some(Exercise::Squat),
            _ => None,
        }
    }

    pub fn config(self) -> ExerciseConfig {
        match self {
            Exercise::BicepCurl => ExerciseConfig {
                angle_up: BICEP_CURL_ANGLE_UP,
                angle_down: BICEP_CURL_ANGLE_DOWN,
                gate: PostureGate::BicepCurl {
                    visibility: posture::BICEP_CURL_VISIBILITY,
                    swing_limit: posture::SHOULDER_SWING_LIMIT,
                },
                initial_phase: Some(Phase::Down),
            },
            Exercise::Crunch => ExerciseConfig {
                angle_up: CRUNCH_ANGLE_UP,
                angle_down: CRUNCH_ANGLE_DOWN,
                gate: PostureGate::Crunch {
                    visibility: posture::CRUNCH_VISIBILITY,
                    lying_down: posture::LYING_DOWN_THRESHOLD,
                    knee_bent: posture::KNEE_BENT_THRESHOLD,
                },
                initial_phase: Some(Phase::Down),
            },
            Exercise::Pushup => ExerciseConfig {
                angle_up: PUSHUP_ELBOW_ANGLE_UP,
                angle_down: PUSHUP_ELBOW_ANGLE_DOWN,
                gate: PostureGate::Pushup {
                    horizontal_tolerance: posture::HORIZONTAL_POSE_TOLERANCE,
                },
                initial_phase: None,
            },
            Exercise::Pullup => ExerciseConfig {
                angle_up: PULLUP_ELBOW_ANGLE_UP,
                angle_down: PULLUP_ELBOW_ANGLE_DOWN,
                gate: PostureGate::Pullup,
                initial_phase: None,
            },
            Exercise::Squat => ExerciseConfig {
                angle_up: SQUAT_KNEE_ANGLE_UP,
                angle_down: SQUAT_KNEE_ANGLE_DOWN,
                gate: PostureGate::Squat {
                    visibility: posture::SQUAT_VISIBILITY,
                    feet_on_ground: posture::FEET_ON_GROUND_THRESHOLD,
                },
                initial_phase: Some(Phase::Up),
            },
        }
    }

    /// The three joints whose angle drives the rep count, vertex in the middle.
    pub fn primary_joints(self, side: Side) -> [Joint; 3] {
        match self {
            Exercise::BicepCurl | Exercise::Pushup | Exercise::Pullup => {
                [side.shoulder(), side.elbow(), side.wrist()]
            }
            Exercise::Crunch => [side.shoulder(), side.hip(), side.knee()],
            Exercise::Squat => [side.hip(), side.knee(), side.ankle()],
        }
    }
}

impl std::fmt::Display for Exercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Gate, angle and state machine for one exercise. Owns its rep state.
#[derive(Debug, Clone)]
pub struct ExerciseEngine {
    exercise: Exercise,
    gate: PostureGate,
    machine: RepStateMachine,
}

impl ExerciseEngine {
    pub fn new(exercise: Exercise) -> Self {
        Self {
            exercise,
            gate: exercise.config().gate,
            machine: RepStateMachine::new(exercise),
        }
    }

    pub fn exercise(&self) -> Exercise {
        self.exercise
    }

    pub fn state(&self) -> RepState {
        self.machine.state()
    }

    pub fn snapshot(&self) -> AnalysisResult {
        let state = self.machine.state();
        AnalysisResult {
            rep_count: state.count,
            position: state.phase.map(Position::from),
        }
    }

    /// Analyze one frame. `None` means the detector found nobody, which
    /// leaves everything as it was.
    pub fn analyze(&mut self, landmarks: Option<&PoseLandmarks>) -> AnalysisResult {
        let Some(landmarks) = landmarks else {
            return self.snapshot();
        };

        let side = match self.gate.evaluate(landmarks) {
            GateOutcome::Accepted(side) => side,
            GateOutcome::Rejected(reason) => {
                debug!(exercise = %self.exercise, ?reason, "frame not counted");
                return self.unknown();
            }
        };

        let [a, b, c] = self.exercise.primary_joints(side);
        let angle = match joint_angle(landmarks.point(a), landmarks.point(b), landmarks.point(c)) {
            Ok(angle) => angle,
            Err(e) => {
                debug!(exercise = %self.exercise, ?side, "{}", e);
                return self.unknown();
            }
        };

        if self.machine.transition(angle) {
            debug!(
                exercise = %self.exercise,
                angle,
                count = self.machine.state().count,
                "rep counted"
            );
        }

        self.snapshot()
    }

    fn unknown(&self) -> AnalysisResult {
        AnalysisResult {
            rep_count: self.machine.state().count,
            position: Some(Position::Unknown),
        }
    }
}
