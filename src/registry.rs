// src/registry.rs
use tracing::warn;

use crate::exercise::{Exercise, ExerciseEngine};

/// Turns client-supplied exercise ids into fresh engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineRegistry {
    default: Exercise,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self { default: Exercise::Pushup }
    }
}

impl EngineRegistry {
    pub fn new(default: Exercise) -> Self {
        Self { default }
    }

    pub fn default_exercise(&self) -> Exercise {
        self.default
    }

    pub fn resolve(&self, id: &str) -> Exercise {
        Exercise::from_id(id).unwrap_or_else(|| {
            warn!(requested = id, fallback = %self.default, "unknown exercise, using default");
            self.default
        })
    }

    /// A new engine always starts from zero reps; nothing carries over.
    pub fn create(&self, id: &str) -> ExerciseEngine {
        ExerciseEngine::new(self.resolve(id))
    }

    pub fn supported() -> impl Iterator<Item = &'static str> {
        Exercise::ALL.into_iter().map(Exercise::id)
    }
}
