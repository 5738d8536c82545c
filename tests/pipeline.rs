// tests/pipeline.rs - End-to-end behaviour of the frame loop and session handling
use image::{DynamicImage, GenericImageView};
use rep_counter::frame::{FrameTiming, ProcessedFrame, VideoFrame, SIGNAL_LOST_TEXT};
use rep_counter::pipeline::{FramePipeline, PipelineSettings, StopReason};
use rep_counter::simulation::pose_for;
use rep_counter::{
    AnalysisResult, ConnectionState, Control, EngineRegistry, Exercise, ExerciseSelection, LandmarkProvider,
    PipelineSummary, PoseLandmarks, Position, Session, SessionSlot, Settings, StreamEnds, StreamIo,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hands out queued detections in order; reports nobody once the queue is empty.
#[derive(Clone, Default)]
struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Option<PoseLandmarks>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn with_angles(exercise: Exercise, angles: &[f64]) -> Self {
        let provider = Self::default();
        provider.push_angles(exercise, angles);
        provider
    }

    fn push_angles(&self, exercise: Exercise, angles: &[f64]) {
        let mut script = self.script.lock().unwrap();
        script.extend(angles.iter().map(|&angle| Some(pose_for(exercise, angle))));
    }

    fn push_missing(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, _image: &DynamicImage) -> anyhow::Result<Option<PoseLandmarks>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().pop_front().flatten())
    }
}

fn frame(pts: i64) -> VideoFrame {
    VideoFrame {
        image: DynamicImage::new_rgb8(32, 24),
        timing: FrameTiming { pts, time_base: (1, 90_000) },
    }
}

fn settings(frame_timeout: Duration, emit_interval: Duration) -> PipelineSettings {
    PipelineSettings {
        frame_timeout,
        emit_interval,
        placeholder_size: (640, 480),
    }
}

struct Running {
    ends: StreamEnds,
    control: mpsc::Sender<Control>,
    task: JoinHandle<PipelineSummary>,
}

impl Running {
    fn start(exercise_id: &str, provider: ScriptedProvider, settings: PipelineSettings) -> Self {
        let (io, ends) = StreamIo::channel(32);
        let (control, control_rx) = mpsc::channel(8);
        let pipeline = FramePipeline::new(EngineRegistry::default(), exercise_id, provider, settings, io, control_rx);
        Self {
            ends,
            control,
            task: tokio::spawn(pipeline.run()),
        }
    }

    async fn push(&mut self, pts: i64) -> ProcessedFrame {
        self.ends.frames.send(frame(pts)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.ends.processed.recv())
            .await
            .expect("no processed frame")
            .expect("processed stream closed")
    }

    async fn stop(self) -> (PipelineSummary, StreamEnds) {
        self.control.send(Control::Teardown).await.unwrap();
        (self.task.await.unwrap(), self.ends)
    }
}

fn result(rep_count: u32, position: Position) -> AnalysisResult {
    AnalysisResult {
        rep_count,
        position: Some(position),
    }
}

#[tokio::test]
async fn silence_produces_placeholder_without_detection() {
    let provider = ScriptedProvider::default();
    let mut running = Running::start(
        "pushup",
        provider.clone(),
        settings(Duration::from_millis(30), Duration::ZERO),
    );

    let placeholder = tokio::time::timeout(Duration::from_secs(5), running.ends.processed.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.image.dimensions(), (640, 480));
    assert_eq!(placeholder.overlay[0].text, SIGNAL_LOST_TEXT);
    assert_eq!(placeholder.overlay[0].origin, (50, 240));

    let (summary, mut ends) = running.stop().await;
    assert_eq!(provider.calls(), 0);
    assert!(summary.frames_timed_out >= 1);
    assert_eq!(summary.frames_processed, 0);
    assert_eq!(summary.results_emitted, 0);
    assert!(ends.feedback.try_recv().is_err());
}

#[tokio::test]
async fn silence_leaves_a_counted_rep_untouched() {
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &[170.0, 60.0, 170.0]);
    let mut running = Running::start(
        "pushup",
        provider.clone(),
        settings(Duration::from_millis(250), Duration::ZERO),
    );

    for pts in 0..3 {
        assert!(!running.push(pts).await.is_placeholder());
    }
    let mut before = Vec::new();
    while let Ok(result) = running.ends.feedback.try_recv() {
        before.push(result);
    }
    assert_eq!(before.last(), Some(&result(1, Position::Up)));

    let placeholder = tokio::time::timeout(Duration::from_secs(5), running.ends.processed.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(placeholder.is_placeholder());

    let (summary, mut ends) = running.stop().await;
    assert_eq!(provider.calls(), 3);
    assert!(summary.frames_timed_out >= 1);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.final_result, result(1, Position::Up));
    assert!(ends.feedback.try_recv().is_err());
}

#[tokio::test]
async fn teardown_is_served_while_processed_frames_back_up() {
    let settings = Settings {
        emit_interval_ms: 0,
        channel_capacity: 1,
        ..Settings::default()
    };
    let (io, ends) = StreamIo::channel(1);
    let mut session = Session::spawn(&settings, settings.registry(), "pushup", ScriptedProvider::default(), io);

    // Nobody reads `ends.processed`; the second frame cannot be delivered.
    for pts in 0..3 {
        ends.frames.send(frame(pts)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(3), session.switch_exercise("squat"))
        .await
        .expect("switch blocked behind the stalled consumer")
        .unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(3), session.teardown())
        .await
        .expect("teardown blocked behind the stalled consumer")
        .unwrap()
        .expect("first teardown reports");

    assert_eq!(summary.stop, StopReason::Teardown);
    assert_eq!(summary.exercise, Exercise::Squat);
    assert_eq!(summary.frames_processed, 2);
    drop(ends);
}

#[tokio::test]
async fn dropped_feedback_does_not_hold_back_the_next_result() {
    let (frames_tx, frames_rx) = mpsc::channel(4);
    let (processed_tx, mut processed_rx) = mpsc::channel(4);
    let (feedback_tx, mut feedback_rx) = mpsc::channel(1);
    let stale = result(9, Position::Down);
    feedback_tx.try_send(stale).unwrap();

    let io = StreamIo {
        frames: frames_rx,
        processed: processed_tx,
        feedback: feedback_tx,
    };
    let (control, control_rx) = mpsc::channel(4);
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &[170.0, 60.0]);
    let pipeline = FramePipeline::new(
        EngineRegistry::default(),
        "pushup",
        provider,
        settings(Duration::from_secs(5), Duration::from_secs(60)),
        io,
        control_rx,
    );
    let task = tokio::spawn(pipeline.run());

    // Feedback channel is full: this result is dropped.
    frames_tx.send(frame(0)).await.unwrap();
    processed_rx.recv().await.unwrap();
    assert_eq!(feedback_rx.recv().await, Some(stale));

    // The drop must not have started a 60 s window.
    frames_tx.send(frame(1)).await.unwrap();
    processed_rx.recv().await.unwrap();
    assert_eq!(feedback_rx.try_recv().ok(), Some(result(0, Position::Down)));

    control.send(Control::Teardown).await.unwrap();
    let summary = task.await.unwrap();
    assert_eq!(summary.results_emitted, 1);
}

#[tokio::test]
async fn pushup_reps_flow_through_to_feedback() {
    let angles = [170.0, 60.0, 170.0, 100.0, 60.0, 170.0];
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &angles);
    let mut running = Running::start("pushup", provider, settings(Duration::from_secs(5), Duration::ZERO));

    let mut feedback = Vec::new();
    let mut last = None;
    for pts in 0..angles.len() as i64 {
        let processed = running.push(pts * 3000).await;
        assert_eq!(processed.timing, Some(FrameTiming { pts: pts * 3000, time_base: (1, 90_000) }));
        feedback.push(running.ends.feedback.recv().await.unwrap());
        last = Some(processed);
    }

    assert_eq!(
        feedback,
        vec![
            result(0, Position::Up),
            result(0, Position::Down),
            result(1, Position::Up),
            result(1, Position::Up),
            result(1, Position::Down),
            result(2, Position::Up),
        ]
    );

    let last = last.unwrap();
    assert_eq!(last.overlay[0].text, "Reps: 2");
    assert_eq!(last.overlay[1].text, "Position: up");

    let (summary, _) = running.stop().await;
    assert_eq!(summary.stop, StopReason::Teardown);
    assert_eq!(summary.exercise, Exercise::Pushup);
    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.results_emitted, 6);
    assert_eq!(summary.final_result, result(2, Position::Up));
}

#[tokio::test]
async fn feedback_is_throttled_but_frames_are_not() {
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &[170.0, 60.0, 170.0]);
    let mut running = Running::start(
        "pushup",
        provider,
        settings(Duration::from_secs(5), Duration::from_secs(60)),
    );

    for pts in 0..3 {
        let processed = running.push(pts).await;
        assert!(!processed.is_placeholder());
    }

    let (summary, mut ends) = running.stop().await;
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.results_emitted, 1);
    assert_eq!(ends.feedback.recv().await, Some(result(0, Position::Up)));
    assert_eq!(ends.feedback.recv().await, None);
    // The engine kept counting even while nothing was emitted.
    assert_eq!(summary.final_result, result(1, Position::Up));
}

#[tokio::test]
async fn switching_exercise_starts_a_fresh_count() {
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &[170.0, 60.0, 170.0]);
    let mut running = Running::start(
        "pushup",
        provider.clone(),
        settings(Duration::from_secs(5), Duration::ZERO),
    );

    for pts in 0..3 {
        running.push(pts).await;
    }
    let mut seen = Vec::new();
    while let Ok(result) = running.ends.feedback.try_recv() {
        seen.push(result);
    }
    assert_eq!(seen.last(), Some(&result(1, Position::Up)));

    running
        .control
        .send(Control::SetExercise("squat".to_string()))
        .await
        .unwrap();
    provider.push_angles(Exercise::Squat, &[170.0]);
    running.push(3).await;
    assert_eq!(running.ends.feedback.recv().await, Some(result(0, Position::Up)));

    let (summary, _) = running.stop().await;
    assert_eq!(summary.exercise, Exercise::Squat);
    assert_eq!(summary.final_result.rep_count, 0);
}

#[tokio::test]
async fn missing_person_keeps_the_last_position() {
    let provider = ScriptedProvider::with_angles(Exercise::Pushup, &[170.0]);
    provider.push_missing();
    let mut running = Running::start(
        "pushup",
        provider.clone(),
        settings(Duration::from_secs(5), Duration::ZERO),
    );

    running.push(0).await;
    let second = running.push(1).await;

    assert_eq!(running.ends.feedback.recv().await, Some(result(0, Position::Up)));
    assert_eq!(running.ends.feedback.recv().await, Some(result(0, Position::Up)));
    assert_eq!(second.overlay[1].text, "Position: up");
    assert_eq!(provider.calls(), 2);

    running.stop().await;
}

#[tokio::test]
async fn closing_the_inbound_stream_stops_the_pipeline() {
    let running = Running::start(
        "squat",
        ScriptedProvider::default(),
        settings(Duration::from_secs(5), Duration::ZERO),
    );
    let Running { ends, control: _control, task } = running;
    drop(ends.frames);

    let summary = task.await.unwrap();
    assert_eq!(summary.stop, StopReason::StreamEnded);
    assert_eq!(summary.exercise, Exercise::Squat);
}

fn quick_settings() -> Settings {
    Settings {
        emit_interval_ms: 0,
        ..Settings::default()
    }
}

#[tokio::test]
async fn session_teardown_is_idempotent() {
    let settings = quick_settings();
    let (io, mut ends) = StreamIo::channel(8);
    let mut session = Session::spawn(&settings, settings.registry(), "crunch", ScriptedProvider::default(), io);
    assert!(session.is_active());

    let summary = session.teardown().await.unwrap().expect("first teardown reports");
    assert_eq!(summary.stop, StopReason::Teardown);
    assert_eq!(summary.exercise, Exercise::Crunch);
    assert!(session.teardown().await.unwrap().is_none());
    assert!(!session.is_active());

    assert!(ends.processed.recv().await.is_none());
    assert!(ends.feedback.recv().await.is_none());
    assert!(ends.frames.is_closed());
    assert!(session.switch_exercise("squat").await.is_err());
}

#[tokio::test]
async fn opening_a_new_session_replaces_the_old_one() {
    let settings = quick_settings();
    let mut slot = SessionSlot::new(settings.clone(), settings.registry());
    let selection = ExerciseSelection::default();

    let (first_io, mut first_ends) = StreamIo::channel(8);
    assert!(slot.open(&selection, ScriptedProvider::default(), first_io).await.unwrap().is_none());
    let first_id = slot.current().unwrap().id();

    let (second_io, second_ends) = StreamIo::channel(8);
    let squat = ExerciseSelection {
        exercise_type: "squat".to_string(),
    };
    let replaced = slot
        .open(&squat, ScriptedProvider::default(), second_io)
        .await
        .unwrap()
        .expect("previous session summary");
    assert_eq!(replaced.exercise, Exercise::Pushup);

    assert!(first_ends.feedback.recv().await.is_none());
    assert!(first_ends.frames.is_closed());
    assert!(!second_ends.frames.is_closed());

    let current = slot.current().unwrap();
    assert_ne!(current.id(), first_id);
    assert!(current.is_active());

    let summary = slot.teardown().await.unwrap().unwrap();
    assert_eq!(summary.exercise, Exercise::Squat);
}

#[tokio::test]
async fn failed_connection_tears_the_session_down() {
    let settings = quick_settings();
    let mut slot = SessionSlot::new(settings.clone(), settings.registry());
    let (io, ends) = StreamIo::channel(8);
    slot.open(&ExerciseSelection::default(), ScriptedProvider::default(), io)
        .await
        .unwrap();

    assert!(slot.on_connection_state(ConnectionState::Connected).await.unwrap().is_none());
    assert!(slot.current().is_some());

    let summary = slot.on_connection_state(ConnectionState::Failed).await.unwrap();
    assert!(summary.is_some());
    assert!(slot.current().is_none());
    assert!(ends.frames.is_closed());

    let selection = ExerciseSelection {
        exercise_type: "squat".to_string(),
    };
    assert!(!slot.switch_exercise(&selection).await.unwrap());
}
