// src/reps.rs - Hysteresis rep counting
use serde::{Deserialize, Serialize};

use crate::exercise::Exercise;

/// Stored phase of a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Up,
    Down,
}

/// Observable position label. `Unknown` is only ever reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Up,
    Down,
    Unknown,
}

impl From<Phase> for Position {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Up => Position::Up,
            Phase::Down => Position::Down,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Position::Up => "up",
            Position::Down => "down",
            Position::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepState {
    pub count: u32,
    /// `None` until the first reading lands in one of the extremes.
    pub phase: Option<Phase>,
}

/// Result of one analyzed frame, as sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "repCount")]
    pub rep_count: u32,
    pub position: Option<Position>,
}

impl AnalysisResult {
    /// Overlay label; `None` before the first reading lands in an extreme.
    pub fn position_label(&self) -> String {
        self.position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "None".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RepStateMachine {
    exercise: Exercise,
    angle_up: f64,
    angle_down: f64,
    state: RepState,
}

impl RepStateMachine {
    pub fn new(exercise: Exercise) -> Self {
        let config = exercise.config();
        Self {
            exercise,
            angle_up: config.angle_up,
            angle_down: config.angle_down,
            state: RepState {
                count: 0,
                phase: config.initial_phase,
            },
        }
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    /// Feed one trusted angle. Returns true when a rep was counted.
    pub fn transition(&mut self, angle: f64) -> bool {
        let before = self.state.count;
        let (up, down) = (self.angle_up, self.angle_down);
        let state = &mut self.state;

        match self.exercise {
            Exercise::BicepCurl => {
                if angle < up {
                    state.phase = Some(Phase::Up);
                } else if angle > down && state.phase == Some(Phase::Up) {
                    state.count += 1;
                    state.phase = Some(Phase::Down);
                }
            }
            Exercise::Crunch => {
                if angle < up {
                    state.phase = Some(Phase::Up);
                } else if angle > down && state.phase == Some(Phase::Up) {
                    state.count += 1;
                    state.phase = Some(Phase::Down);
                }
            }
            Exercise::Pushup => {
                if angle > up {
                    if state.phase == Some(Phase::Down) {
                        state.count += 1;
                    }
                    state.phase = Some(Phase::Up);
                } else if angle < down {
                    state.phase = Some(Phase::Down);
                }
            }
            Exercise::Squat => {
                if angle > up {
                    if state.phase == Some(Phase::Down) {
                        state.count += 1;
                    }
                    state.phase = Some(Phase::Up);
                } else if angle < down {
                    state.phase = Some(Phase::Down);
                }
            }
            Exercise::Pullup => {
                // Hanging with straight arms.
                if angle > down {
                    state.phase = Some(Phase::Down);
                }
                // Chin over the bar.
                if angle < up {
                    if state.phase == Some(Phase::Down) {
                        state.count += 1;
                    }
                    state.phase = Some(Phase::Up);
                }
            }
        }

        self.state.count != before
    }
}
