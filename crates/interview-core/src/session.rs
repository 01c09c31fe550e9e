use crate::actor::{ActorReport, TurnActor};
use crate::config::TurnConfig;
use crate::generator::ResponseGenerator;
use crate::recognition::{AudioConfig, RecognitionEvent, RecognitionStream, RecognitionUpdate, Recognizer};
use crate::script::QuestionList;
use crate::stats::SessionStats;
use crate::synthesis::Synthesizer;
use crate::SessionError;
use interview_types::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

const TURN_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Closing,
    Closed,
}

/// Collaborators shared by every session a server hosts.
#[derive(Clone)]
pub struct SessionDeps {
    pub recognizer: Arc<dyn Recognizer>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub questions: QuestionList,
    pub config: TurnConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The client went away.
    Disconnected,
    /// The client sent `stop-stream`.
    Stopped,
    Failed(SessionError),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub id: Uuid,
    pub end: SessionEnd,
    pub stats: SessionStats,
    pub questions_asked: usize,
    pub interview_complete: bool,
}

/// One client's interview, from `start-stream` to teardown.
pub struct Session {
    id: Uuid,
    state: SessionState,
    deps: SessionDeps,
}

impl Session {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            deps,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(session = %self.id, from = ?self.state, to = ?state, "session state");
        self.state = state;
    }

    fn summary(&self, end: SessionEnd, report: Option<ActorReport>) -> SessionSummary {
        let (stats, questions_asked, interview_complete) = match report {
            Some(report) => (report.stats, report.cursor, report.interview_complete),
            None => (SessionStats::default(), 0, false),
        };
        SessionSummary {
            id: self.id,
            end,
            stats,
            questions_asked,
            interview_complete,
        }
    }

    /// Drives the session until the client disconnects, stops, or a terminal
    /// error occurs. Every resource the session opened is released before this
    /// returns.
    pub async fn run(
        &mut self,
        mut inbound: mpsc::Receiver<ClientEvent>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> SessionSummary {
        loop {
            match inbound.recv().await {
                Some(ClientEvent::StartStream) => break,
                Some(ClientEvent::StopStream) => {
                    self.set_state(SessionState::Closed);
                    return self.summary(SessionEnd::Stopped, None);
                }
                Some(ClientEvent::AudioStream(audio)) => {
                    tracing::debug!(session = %self.id, "dropping {} bytes sent before start", audio.len());
                }
                None => {
                    self.set_state(SessionState::Closed);
                    return self.summary(SessionEnd::Disconnected, None);
                }
            }
        }

        self.set_state(SessionState::Starting);
        tracing::info!(session = %self.id, "starting interview session");
        let mut stream = match self.deps.recognizer.open(&self.deps.audio).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(session = %self.id, "failed to open recognition stream: {}", e);
                let _ = outbound
                    .send(ServerEvent::session_error(e.kind(), e.to_string()))
                    .await;
                self.set_state(SessionState::Closed);
                return self.summary(SessionEnd::Failed(e), None);
            }
        };

        let (turn_tx, turn_rx) = mpsc::channel(TURN_QUEUE_CAPACITY);
        let actor = TurnActor::new(
            self.id,
            self.deps.config.clone(),
            self.deps.questions.clone(),
            self.deps.generator.clone(),
            self.deps.synthesizer.clone(),
            outbound.clone(),
        );
        let mut actor_handle = Some(tokio::spawn(actor.run(turn_rx)));
        let mut finished_report = None;

        let end = loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(ClientEvent::AudioStream(audio)) => {
                        stream.write(audio).await;
                    }
                    Some(ClientEvent::StartStream) => {
                        tracing::debug!(session = %self.id, "ignoring repeated start-stream");
                    }
                    Some(ClientEvent::StopStream) => break SessionEnd::Stopped,
                    None => break SessionEnd::Disconnected,
                },
                update = stream.next_update() => match update {
                    Some(RecognitionUpdate::Opened) => {
                        self.set_state(SessionState::Active);
                        if outbound.send(ServerEvent::Ready).await.is_err() {
                            break SessionEnd::Disconnected;
                        }
                    }
                    Some(RecognitionUpdate::Event(event)) => {
                        if let Some(display) = transcript_event(&event) {
                            if outbound.send(display).await.is_err() {
                                break SessionEnd::Disconnected;
                            }
                        }
                        if turn_tx.send(event).await.is_err() {
                            tracing::warn!(session = %self.id, "turn actor stopped accepting events");
                        }
                    }
                    Some(RecognitionUpdate::Failed(message)) => {
                        break SessionEnd::Failed(SessionError::RecognitionProvider(message));
                    }
                    None => {
                        break SessionEnd::Failed(SessionError::RecognitionProvider(
                            "recognition stream closed unexpectedly".into(),
                        ));
                    }
                },
                joined = join_actor(&mut actor_handle) => {
                    actor_handle = None;
                    match joined {
                        Ok(report) => {
                            let end = match &report.exit {
                                Err(e) => SessionEnd::Failed(e.clone()),
                                Ok(()) => SessionEnd::Failed(SessionError::Transport("turn actor stopped".into())),
                            };
                            finished_report = Some(report);
                            break end;
                        }
                        Err(e) => {
                            break SessionEnd::Failed(SessionError::Transport(format!("turn actor failed: {e}")));
                        }
                    }
                }
            }
        };

        self.set_state(SessionState::Closing);
        let report = self
            .teardown(&mut stream, turn_tx, actor_handle, finished_report)
            .await;

        if let SessionEnd::Failed(e) = &end {
            tracing::error!(session = %self.id, "session failed: {}", e);
            if !matches!(e, SessionError::Transport(_)) {
                let _ = outbound
                    .send(ServerEvent::session_error(e.kind(), e.to_string()))
                    .await;
            }
        }

        self.set_state(SessionState::Closed);
        let summary = self.summary(end, report);
        tracing::info!(
            session = %self.id,
            end = ?summary.end,
            stats = ?summary.stats,
            questions_asked = summary.questions_asked,
            "session closed"
        );
        summary
    }

    async fn teardown(
        &self,
        stream: &mut RecognitionStream,
        turn_tx: mpsc::Sender<RecognitionEvent>,
        actor_handle: Option<JoinHandle<ActorReport>>,
        finished_report: Option<ActorReport>,
    ) -> Option<ActorReport> {
        stream.close();
        drop(turn_tx);
        match actor_handle {
            Some(handle) => match handle.await {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::error!(session = %self.id, "turn actor failed during teardown: {}", e);
                    None
                }
            },
            None => finished_report,
        }
    }
}

fn transcript_event(event: &RecognitionEvent) -> Option<ServerEvent> {
    match event {
        RecognitionEvent::Interim { text } => Some(ServerEvent::TranscriptInterim { text: text.clone() }),
        RecognitionEvent::Final { text } => Some(ServerEvent::TranscriptFinal { text: text.clone() }),
        RecognitionEvent::UtteranceEnd => None,
    }
}

async fn join_actor(
    handle: &mut Option<JoinHandle<ActorReport>>,
) -> Result<ActorReport, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
