// src/simulation.rs - Synthetic poses and frames for running without a camera or detector
use image::DynamicImage;
use nalgebra::Vector2;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::exercise::Exercise;
use crate::frame::{FrameTiming, VideoFrame};
use crate::geometry::rotate;
use crate::landmarks::{Joint, Landmark, PoseLandmarks, Side};
use crate::pipeline::LandmarkProvider;

const VISIBLE: f64 = 0.95;
const TIME_BASE: (u32, u32) = (1, 90_000);

/// A side-on pose for `exercise` whose primary joint angle is `angle` degrees
/// and which passes that exercise's posture gate (for angles the exercise
/// actually moves through). Both sides share coordinates.
pub fn pose_for(exercise: Exercise, angle: f64) -> PoseLandmarks {
    let mut pose = PoseLandmarks::uniform(VISIBLE);

    match exercise {
        Exercise::BicepCurl => {
            let shoulder = Vector2::new(0.5, 0.3);
            let elbow = Vector2::new(0.5, 0.45);
            place(&mut pose, Side::shoulder, shoulder);
            place(&mut pose, Side::hip, Vector2::new(0.5, 0.6));
            place(&mut pose, Side::elbow, elbow);
            place(&mut pose, Side::wrist, swing(elbow, shoulder, angle, 0.15));
        }
        Exercise::Crunch => {
            let hip = Vector2::new(0.45, 0.85);
            let thigh = rotate(Vector2::new(1.0, 0.0), -41.0);
            let knee = hip + thigh * 0.15;
            place(&mut pose, Side::hip, hip);
            place(&mut pose, Side::knee, knee);
            place(&mut pose, Side::ankle, swing(knee, hip, -90.0, 0.15));
            place(&mut pose, Side::shoulder, swing(hip, knee, -angle, 0.12));
        }
        Exercise::Pushup => {
            let shoulder = Vector2::new(0.3, 0.5);
            let elbow = Vector2::new(0.3, 0.65);
            place(&mut pose, Side::shoulder, shoulder);
            place(&mut pose, Side::hip, Vector2::new(0.55, 0.55));
            place(&mut pose, Side::ankle, Vector2::new(0.85, 0.6));
            place(&mut pose, Side::elbow, elbow);
            place(&mut pose, Side::wrist, swing(elbow, shoulder, angle, 0.15));
        }
        Exercise::Pullup => {
            let shoulder = Vector2::new(0.5, 0.4);
            let elbow = Vector2::new(0.4, 0.3);
            place(&mut pose, Side::shoulder, shoulder);
            place(&mut pose, Side::hip, Vector2::new(0.5, 0.75));
            place(&mut pose, Side::elbow, elbow);
            place(&mut pose, Side::wrist, swing(elbow, shoulder, -angle, 0.15));
        }
        Exercise::Squat => {
            let knee = Vector2::new(0.5, 0.7);
            let ankle = Vector2::new(0.5, 0.9);
            let hip = swing(knee, ankle, angle, 0.2);
            place(&mut pose, Side::ankle, ankle);
            place(&mut pose, Side::knee, knee);
            place(&mut pose, Side::hip, hip);
            place(&mut pose, Side::shoulder, hip + Vector2::new(0.05, -0.25));
        }
    }

    pose
}

/// Point at `length` from `vertex`, rotated `degrees` away from the ray toward `reference`.
fn swing(vertex: Vector2<f64>, reference: Vector2<f64>, degrees: f64, length: f64) -> Vector2<f64> {
    vertex + rotate((reference - vertex).normalize(), degrees) * length
}

fn place(pose: &mut PoseLandmarks, joint: fn(Side) -> Joint, at: Vector2<f64>) {
    for side in [Side::Left, Side::Right] {
        pose.set(joint(side), Landmark::new(at.x, at.y, VISIBLE));
    }
}

/// Detector stand-in that ignores the image and moves through the active
/// exercise's range of motion, one rep per `rep_period`.
pub struct SimulatedProvider {
    exercise: watch::Receiver<Exercise>,
    sim_time: f64,
    frame_interval: f64,
    rep_period: f64,
    dropout_every: Option<u64>,
    frames: u64,
}

impl SimulatedProvider {
    pub fn new(exercise: watch::Receiver<Exercise>, fps: u32) -> Self {
        Self {
            exercise,
            sim_time: 0.0,
            frame_interval: 1.0 / f64::from(fps.max(1)),
            rep_period: 3.0,
            dropout_every: None,
            frames: 0,
        }
    }

    pub fn with_rep_period(mut self, rep_period: Duration) -> Self {
        self.rep_period = rep_period.as_secs_f64().max(self.frame_interval);
        self
    }

    /// Report "nobody detected" on every n-th frame.
    pub fn with_dropouts(mut self, every: u64) -> Self {
        self.dropout_every = (every > 0).then_some(every);
        self
    }

    fn current_angle(&self, exercise: Exercise) -> f64 {
        let config = exercise.config();
        let low = (config.angle_up.min(config.angle_down) - 15.0).max(5.0);
        let high = (config.angle_up.max(config.angle_down) + 15.0).min(178.0);
        let mid = (low + high) / 2.0;
        let amplitude = (high - low) / 2.0;
        let phase = std::f64::consts::TAU * self.sim_time / self.rep_period;
        mid + amplitude * phase.cos()
    }
}

impl LandmarkProvider for SimulatedProvider {
    fn detect(&mut self, _image: &DynamicImage) -> anyhow::Result<Option<PoseLandmarks>> {
        self.frames += 1;
        self.sim_time += self.frame_interval;

        if let Some(every) = self.dropout_every {
            if self.frames % every == 0 {
                return Ok(None);
            }
        }

        let exercise = *self.exercise.borrow();
        let angle = self.current_angle(exercise);
        Ok(Some(pose_for(exercise, angle)))
    }
}

/// Push blank frames at `fps` until `limit` frames were sent or the
/// receiving side goes away.
pub async fn run_feed(frames: mpsc::Sender<VideoFrame>, fps: u32, limit: Option<u64>) {
    let fps = fps.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps)));
    let pts_step = i64::from(TIME_BASE.1 / fps);
    let mut sent = 0u64;

    info!(fps, ?limit, "simulated feed started");
    while limit.map_or(true, |limit| sent < limit) {
        ticker.tick().await;
        let frame = VideoFrame {
            image: DynamicImage::new_rgb8(64, 48),
            timing: FrameTiming {
                pts: sent as i64 * pts_step,
                time_base: TIME_BASE,
            },
        };
        if frames.send(frame).await.is_err() {
            debug!(sent, "feed receiver closed");
            return;
        }
        sent += 1;
    }
    info!(sent, "simulated feed finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::ExerciseEngine;
    use crate::geometry::joint_angle;
    use crate::posture::GateOutcome;

    #[test]
    fn poses_carry_the_requested_angle() {
        for exercise in Exercise::ALL {
            for angle in [50.0, 90.0, 120.0, 170.0] {
                let pose = pose_for(exercise, angle);
                let [a, b, c] = exercise.primary_joints(Side::Left);
                let measured = joint_angle(pose.point(a), pose.point(b), pose.point(c)).unwrap();
                assert!((measured - angle).abs() < 1e-6, "{exercise} {angle} -> {measured}");
            }
        }
    }

    #[test]
    fn poses_pass_their_own_gate() {
        for exercise in Exercise::ALL {
            let gate = exercise.config().gate;
            for angle in [40.0, 65.0, 110.0, 170.0] {
                let outcome = gate.evaluate(&pose_for(exercise, angle));
                assert_eq!(outcome, GateOutcome::Accepted(Side::Left), "{exercise} at {angle}");
            }
        }
    }

    #[test]
    fn provider_drives_reps() {
        let (_tx, rx) = watch::channel(Exercise::Squat);
        let mut provider = SimulatedProvider::new(rx, 30).with_rep_period(Duration::from_secs(1));
        let mut engine = ExerciseEngine::new(Exercise::Squat);
        let image = DynamicImage::new_rgb8(1, 1);

        for _ in 0..(30 * 5) {
            let pose = provider.detect(&image).unwrap();
            engine.analyze(pose.as_ref());
        }
        assert!(engine.state().count >= 4, "counted {}", engine.state().count);
    }

    #[test]
    fn provider_follows_exercise_changes_and_drops_frames() {
        let (tx, rx) = watch::channel(Exercise::Pushup);
        let mut provider = SimulatedProvider::new(rx, 30).with_dropouts(3);
        let image = DynamicImage::new_rgb8(1, 1);

        assert!(provider.detect(&image).unwrap().is_some());
        tx.send(Exercise::Pullup).unwrap();
        let pose = provider.detect(&image).unwrap().unwrap();
        assert!(pose[Joint::LeftWrist].y < pose[Joint::LeftShoulder].y);
        assert!(provider.detect(&image).unwrap().is_none());
    }
}
