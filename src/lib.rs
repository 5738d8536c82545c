//! Exercise repetition counting from a live stream of pose landmarks.
//!
//! Each frame goes through a [`pipeline::FramePipeline`]: the external
//! landmark provider finds the body, the active [`exercise::ExerciseEngine`]
//! checks the posture, measures the driving joint angle and steps its rep
//! state machine, and the result is emitted to the client at a throttled rate.

pub mod config;
pub mod error;
pub mod exercise;
pub mod frame;
pub mod geometry;
pub mod landmarks;
pub mod pipeline;
pub mod posture;
pub mod reconnect;
pub mod registry;
pub mod reps;
pub mod session;
pub mod simulation;

pub use config::Settings;
pub use exercise::{Exercise, ExerciseEngine};
pub use landmarks::{Joint, Landmark, PoseLandmarks, Side};
pub use pipeline::{Control, LandmarkProvider, PipelineSummary, StreamEnds, StreamIo};
pub use registry::EngineRegistry;
pub use reps::{AnalysisResult, Position};
pub use session::{ConnectionState, ExerciseSelection, Session, SessionSlot};
