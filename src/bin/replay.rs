// src/bin/replay.rs - Feed recorded landmark frames through an engine, one JSON line each
//
// Input lines: a 33-landmark array, `null` for a frame with no person, or
// {"exerciseType": "..."} to switch exercise. One result line is printed per frame.
use anyhow::{Context, Result};
use rep_counter::{ExerciseSelection, PoseLandmarks, Settings};
use serde::Deserialize;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Pose(PoseLandmarks),
    Missing(()),
    Select(ExerciseSelection),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let settings = Settings::load(None)?;
    let registry = settings.registry();
    let requested = std::env::args()
        .nth(1)
        .unwrap_or_else(|| settings.default_exercise.clone());
    let mut engine = registry.create(&requested);
    info!(exercise = %engine.exercise(), "replaying landmarks from stdin");

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    let mut frames = 0u64;

    for (n, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let landmarks = match serde_json::from_str::<ReplayLine>(&line) {
            Ok(ReplayLine::Pose(pose)) => Some(pose),
            Ok(ReplayLine::Missing(())) => None,
            Ok(ReplayLine::Select(selection)) => {
                engine = registry.create(&selection.exercise_type);
                info!(exercise = %engine.exercise(), "switched exercise");
                continue;
            }
            Err(e) => {
                warn!(line = n + 1, "skipping unreadable line: {}", e);
                continue;
            }
        };

        let result = engine.analyze(landmarks.as_ref());
        frames += 1;
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
    }

    let result = engine.snapshot();
    info!(
        exercise = %engine.exercise(),
        frames,
        reps = result.rep_count,
        position = %result.position_label(),
        "replay finished"
    );
    Ok(())
}
