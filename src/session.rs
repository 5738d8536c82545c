// src/session.rs - One live stream per connection, with its own control path
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::SessionError;
use crate::exercise::Exercise;
use crate::pipeline::{Control, FramePipeline, LandmarkProvider, PipelineSettings, PipelineSummary, StreamIo};
use crate::registry::EngineRegistry;

/// Exercise choice as sent by the client, e.g. `{"exerciseType": "squat"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSelection {
    #[serde(rename = "exerciseType", default = "default_exercise_id")]
    pub exercise_type: String,
}

fn default_exercise_id() -> String {
    Exercise::Pushup.id().to_string()
}

impl Default for ExerciseSelection {
    fn default() -> Self {
        Self { exercise_type: default_exercise_id() }
    }
}

/// Peer connection states reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

/// A running pipeline plus the handle used to steer it.
///
/// Dropping the session closes its control channel, which the pipeline
/// treats as a teardown.
pub struct Session {
    id: Uuid,
    started_at: DateTime<Local>,
    control: mpsc::Sender<Control>,
    task: Option<JoinHandle<PipelineSummary>>,
}

impl Session {
    pub fn spawn<P>(
        settings: &Settings,
        registry: EngineRegistry,
        exercise_id: &str,
        provider: P,
        io: StreamIo,
    ) -> Self
    where
        P: LandmarkProvider + 'static,
    {
        let id = Uuid::new_v4();
        let (control_tx, control_rx) = mpsc::channel(settings.channel_capacity.max(1));
        let pipeline = FramePipeline::new(
            registry,
            exercise_id,
            provider,
            PipelineSettings::from(settings),
            io,
            control_rx,
        );
        let task = tokio::spawn(pipeline.run().instrument(info_span!("session", %id)));
        info!(%id, exercise = exercise_id, "session started");

        Self {
            id,
            started_at: Local::now(),
            control: control_tx,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Swap the engine. The new engine starts from zero reps.
    pub async fn switch_exercise(&self, exercise_id: &str) -> Result<(), SessionError> {
        info!(id = %self.id, exercise = exercise_id, "switching exercise");
        self.control
            .send(Control::SetExercise(exercise_id.to_string()))
            .await
            .map_err(|_| SessionError::Closed(self.id))
    }

    /// Stop the pipeline and wait for it. Returns the summary the first
    /// time and `None` on every later call.
    pub async fn teardown(&mut self) -> Result<Option<PipelineSummary>, SessionError> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };

        // The pipeline may have stopped on its own already; then nobody is listening.
        let _ = self.control.send(Control::Teardown).await;
        let summary = task.await?;

        let elapsed = Local::now().signed_duration_since(self.started_at);
        info!(
            id = %self.id,
            duration_secs = elapsed.num_seconds(),
            reps = summary.final_result.rep_count,
            frames = summary.frames_processed,
            "session closed"
        );
        Ok(Some(summary))
    }
}

/// Holds at most one session. Opening a new one always tears the old one
/// down first, so two pipelines never write to the transport at once.
pub struct SessionSlot {
    settings: Settings,
    registry: EngineRegistry,
    current: Option<Session>,
}

impl SessionSlot {
    pub fn new(settings: Settings, registry: EngineRegistry) -> Self {
        Self {
            settings,
            registry,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Returns the summary of the session that was replaced, if any.
    pub async fn open<P>(
        &mut self,
        selection: &ExerciseSelection,
        provider: P,
        io: StreamIo,
    ) -> Result<Option<PipelineSummary>, SessionError>
    where
        P: LandmarkProvider + 'static,
    {
        let previous = self.teardown().await?;
        self.current = Some(Session::spawn(
            &self.settings,
            self.registry,
            &selection.exercise_type,
            provider,
            io,
        ));
        Ok(previous)
    }

    /// Returns false when there is no session to switch.
    pub async fn switch_exercise(&self, selection: &ExerciseSelection) -> Result<bool, SessionError> {
        match &self.current {
            Some(session) => {
                session.switch_exercise(&selection.exercise_type).await?;
                Ok(true)
            }
            None => {
                warn!(exercise = %selection.exercise_type, "exercise change without an active session");
                Ok(false)
            }
        }
    }

    pub async fn teardown(&mut self) -> Result<Option<PipelineSummary>, SessionError> {
        match self.current.take() {
            Some(mut session) => session.teardown().await,
            None => Ok(None),
        }
    }

    pub async fn on_connection_state(
        &mut self,
        state: ConnectionState,
    ) -> Result<Option<PipelineSummary>, SessionError> {
        info!(?state, "connection state changed");
        if state.is_terminal() {
            self.teardown().await
        } else {
            Ok(None)
        }
    }
}
