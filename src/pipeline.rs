// src/pipeline.rs - Per-stream frame loop: detect, analyze, annotate, emit
use image::DynamicImage;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::exercise::{Exercise, ExerciseEngine};
use crate::frame::{ProcessedFrame, VideoFrame};
use crate::landmarks::PoseLandmarks;
use crate::registry::EngineRegistry;
use crate::reps::AnalysisResult;

/// External pose detector. Called synchronously, once per received frame.
pub trait LandmarkProvider: Send {
    fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Option<PoseLandmarks>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    SetExercise(String),
    Teardown,
}

/// Outcome of waiting for the next inbound frame.
#[derive(Debug)]
pub enum FrameWait {
    Frame(VideoFrame),
    TimedOut,
    Closed,
}

pub async fn next_frame(frames: &mut mpsc::Receiver<VideoFrame>, deadline: Instant) -> FrameWait {
    match tokio::time::timeout_at(deadline, frames.recv()).await {
        Ok(Some(frame)) => FrameWait::Frame(frame),
        Ok(None) => FrameWait::Closed,
        Err(_) => FrameWait::TimedOut,
    }
}

/// Lets at most one result through per `min_interval`. Only results that
/// were actually delivered start a new window.
#[derive(Debug, Clone)]
pub struct EmissionThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl EmissionThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last: None }
    }

    pub fn ready(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub frame_timeout: Duration,
    pub emit_interval: Duration,
    pub placeholder_size: (u32, u32),
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PipelineSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            frame_timeout: settings.frame_timeout(),
            emit_interval: settings.emit_interval(),
            placeholder_size: (settings.placeholder_width, settings.placeholder_height),
        }
    }
}

/// Pipeline side of one media stream.
#[derive(Debug)]
pub struct StreamIo {
    pub frames: mpsc::Receiver<VideoFrame>,
    pub processed: mpsc::Sender<ProcessedFrame>,
    pub feedback: mpsc::Sender<AnalysisResult>,
}

/// Transport side of one media stream.
#[derive(Debug)]
pub struct StreamEnds {
    pub frames: mpsc::Sender<VideoFrame>,
    pub processed: mpsc::Receiver<ProcessedFrame>,
    pub feedback: mpsc::Receiver<AnalysisResult>,
}

impl StreamIo {
    pub fn channel(capacity: usize) -> (StreamIo, StreamEnds) {
        let capacity = capacity.max(1);
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (processed_tx, processed_rx) = mpsc::channel(capacity);
        let (feedback_tx, feedback_rx) = mpsc::channel(capacity);
        (
            StreamIo {
                frames: frames_rx,
                processed: processed_tx,
                feedback: feedback_tx,
            },
            StreamEnds {
                frames: frames_tx,
                processed: processed_rx,
                feedback: feedback_rx,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Teardown,
    StreamEnded,
    OutputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub exercise: Exercise,
    pub frames_processed: u64,
    pub frames_timed_out: u64,
    pub results_emitted: u64,
    pub final_result: AnalysisResult,
    pub stop: StopReason,
}

enum Step {
    Control(Option<Control>),
    Frame(FrameWait),
}

/// Outcome of handing one frame to the transport.
enum Delivery {
    Sent,
    Teardown,
    OutputClosed,
}

impl Delivery {
    fn stop(self) -> Option<StopReason> {
        match self {
            Delivery::Sent => None,
            Delivery::Teardown => Some(StopReason::Teardown),
            Delivery::OutputClosed => Some(StopReason::OutputClosed),
        }
    }
}

pub struct FramePipeline<P> {
    registry: EngineRegistry,
    engine: ExerciseEngine,
    provider: P,
    settings: PipelineSettings,
    throttle: EmissionThrottle,
    io: StreamIo,
    control: mpsc::Receiver<Control>,
    frames_processed: u64,
    frames_timed_out: u64,
    results_emitted: u64,
}

impl<P: LandmarkProvider> FramePipeline<P> {
    pub fn new(
        registry: EngineRegistry,
        exercise_id: &str,
        provider: P,
        settings: PipelineSettings,
        io: StreamIo,
        control: mpsc::Receiver<Control>,
    ) -> Self {
        Self {
            registry,
            engine: registry.create(exercise_id),
            provider,
            settings,
            throttle: EmissionThrottle::new(settings.emit_interval),
            io,
            control,
            frames_processed: 0,
            frames_timed_out: 0,
            results_emitted: 0,
        }
    }

    /// Runs until torn down, until the inbound stream ends, or until the
    /// transport stops taking processed frames. Frames are handled strictly
    /// in order; control messages are applied between frames and while an
    /// outgoing frame waits for room.
    pub async fn run(mut self) -> PipelineSummary {
        info!(exercise = %self.engine.exercise(), "pipeline started");

        let stop = 'run: loop {
            // A control message does not push the deadline back.
            let deadline = Instant::now() + self.settings.frame_timeout;
            let wait = loop {
                let step = tokio::select! {
                    biased;
                    control = self.control.recv() => Step::Control(control),
                    wait = next_frame(&mut self.io.frames, deadline) => Step::Frame(wait),
                };
                match step {
                    Step::Control(Some(Control::SetExercise(id))) => self.switch_exercise(&id),
                    Step::Control(Some(Control::Teardown)) | Step::Control(None) => {
                        break 'run StopReason::Teardown;
                    }
                    Step::Frame(wait) => break wait,
                }
            };

            let delivery = match wait {
                FrameWait::Frame(frame) => self.process(frame).await,
                FrameWait::TimedOut => {
                    self.frames_timed_out += 1;
                    warn!(timeout = ?self.settings.frame_timeout, "timeout waiting for frame from client");
                    let (width, height) = self.settings.placeholder_size;
                    self.deliver(ProcessedFrame::signal_lost(width, height)).await
                }
                FrameWait::Closed => break StopReason::StreamEnded,
            };
            if let Some(stop) = delivery.stop() {
                break stop;
            }
        };

        let summary = PipelineSummary {
            exercise: self.engine.exercise(),
            frames_processed: self.frames_processed,
            frames_timed_out: self.frames_timed_out,
            results_emitted: self.results_emitted,
            final_result: self.engine.snapshot(),
            stop,
        };
        info!(?summary, "pipeline stopped");
        summary
    }

    fn switch_exercise(&mut self, id: &str) {
        switch_engine(&self.registry, &mut self.engine, id);
    }

    async fn process(&mut self, frame: VideoFrame) -> Delivery {
        let landmarks = match self.provider.detect(&frame.image) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("landmark detection failed: {:#}", e);
                None
            }
        };

        let result = self.engine.analyze(landmarks.as_ref());
        self.frames_processed += 1;

        let now = Instant::now();
        if self.throttle.ready(now) && self.emit(result) {
            self.throttle.mark(now);
        }

        self.deliver(ProcessedFrame::annotated(frame, &result)).await
    }

    /// Waits for room on the processed-frame channel while still serving
    /// control messages, so a stalled consumer cannot block a teardown.
    async fn deliver(&mut self, frame: ProcessedFrame) -> Delivery {
        loop {
            tokio::select! {
                biased;
                control = self.control.recv() => match control {
                    Some(Control::SetExercise(id)) => switch_engine(&self.registry, &mut self.engine, &id),
                    Some(Control::Teardown) | None => {
                        debug!("torn down with a frame still pending");
                        return Delivery::Teardown;
                    }
                },
                permit = self.io.processed.reserve() => {
                    return match permit {
                        Ok(permit) => {
                            permit.send(frame);
                            Delivery::Sent
                        }
                        Err(_) => Delivery::OutputClosed,
                    };
                }
            }
        }
    }

    /// Returns true if the result reached the feedback channel.
    fn emit(&mut self, result: AnalysisResult) -> bool {
        match self.io.feedback.try_send(result) {
            Ok(()) => {
                self.results_emitted += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("feedback channel full, dropping result");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("feedback receiver gone");
                false
            }
        }
    }
}

fn switch_engine(registry: &EngineRegistry, engine: &mut ExerciseEngine, id: &str) {
    *engine = registry.create(id);
    info!(exercise = %engine.exercise(), "switched exercise processor");
}
