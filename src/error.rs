// src/error.rs
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// One of the rays out of the vertex has zero length.
    #[error("degenerate joint angle: a ray from the vertex has zero length")]
    DegenerateAngle,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LandmarkError {
    #[error("expected {expected} pose landmarks, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is already torn down")]
    Closed(uuid::Uuid),

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ReconnectError {
    #[error("gave up after {attempts} connection attempts: {last_error}")]
    GaveUp { attempts: u32, last_error: String },

    #[error("reconnection cancelled")]
    Cancelled,
}
