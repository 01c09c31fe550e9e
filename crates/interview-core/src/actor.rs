use crate::config::TurnConfig;
use crate::generator::{ResponseGenerator, TurnRequest};
use crate::history::HistoryEntry;
use crate::recognition::RecognitionEvent;
use crate::relay::{AudioRelay, RelayReport};
use crate::script::QuestionList;
use crate::stats::SessionStats;
use crate::synthesis::Synthesizer;
use crate::turn::{ReplyVerdict, TurnMachine};
use crate::SessionError;
use interview_types::ServerEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use uuid::Uuid;

/// What the actor hands back when it stops.
#[derive(Debug)]
pub struct ActorReport {
    pub stats: SessionStats,
    /// `Err` when the actor stopped on its own because of a terminal error.
    pub exit: Result<(), SessionError>,
    pub cursor: usize,
    pub history: Vec<HistoryEntry>,
    pub interview_complete: bool,
}

#[derive(Debug)]
struct ReplyOutcome {
    generated: Result<String, SessionError>,
    /// `None` when nothing was synthesized.
    relay: Option<Result<RelayReport, SessionError>>,
}

#[derive(Clone)]
struct ReplyContext {
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn Synthesizer>,
    outbound: mpsc::Sender<ServerEvent>,
    relay: AudioRelay,
    generation_timeout: Duration,
}

/// Single writer of a session's turn state.
///
/// Recognition events arrive on one queue. Each reply (generation, then
/// synthesis relayed to the client) runs as its own task so the queue keeps
/// draining while the interviewer talks; the reply's result comes back through
/// the same loop.
pub struct TurnActor {
    session_id: Uuid,
    machine: TurnMachine,
    config: TurnConfig,
    context: ReplyContext,
    stats: SessionStats,
    reply: Option<JoinHandle<ReplyOutcome>>,
}

impl TurnActor {
    pub fn new(
        session_id: Uuid,
        config: TurnConfig,
        questions: QuestionList,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn Synthesizer>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Self {
        let context = ReplyContext {
            generator,
            synthesizer,
            relay: AudioRelay::new(outbound.clone()),
            outbound,
            generation_timeout: config.generation_timeout,
        };
        Self {
            session_id,
            machine: TurnMachine::new(config.clone(), questions),
            config,
            context,
            stats: SessionStats::new(),
            reply: None,
        }
    }

    /// Runs until `inbound` closes or a terminal error occurs. An in-flight reply
    /// is cancelled on the way out and an open audio segment is closed.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<RecognitionEvent>) -> ActorReport {
        if let Some(request) = self.machine.start() {
            self.spawn_reply(request);
        }

        let exit = loop {
            let deadline = self.machine.deadline();
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => {
                        if self.machine.on_recognition(event, Instant::now()) {
                            tracing::debug!(session = %self.session_id, state = ?self.machine.state(), "utterance pending");
                        }
                    }
                    None => break Ok(()),
                },
                _ = silence(deadline) => {
                    if let Some(request) = self.machine.on_silence_elapsed(Instant::now()) {
                        self.spawn_reply(request);
                    } else {
                        tracing::debug!(session = %self.session_id, "silence elapsed while a reply is in flight");
                    }
                }
                joined = join_reply(&mut self.reply) => {
                    self.reply = None;
                    if let Err(e) = self.finish_reply(joined).await {
                        break Err(e);
                    }
                }
            }
        };

        self.shutdown().await;
        ActorReport {
            stats: self.stats,
            exit,
            cursor: self.machine.cursor(),
            history: self.machine.history().snapshot(),
            interview_complete: self.machine.is_finished(),
        }
    }

    fn spawn_reply(&mut self, request: TurnRequest) {
        self.stats.record_dispatch();
        let delay = self.config.thinking_delay.map(|range| range.sample());
        tracing::info!(
            session = %self.session_id,
            kind = ?request.kind,
            cursor = self.machine.cursor(),
            "dispatching turn"
        );
        self.reply = Some(tokio::spawn(deliver_reply(
            self.context.clone(),
            request,
            delay,
        )));
    }

    async fn finish_reply(
        &mut self,
        joined: Result<ReplyOutcome, JoinError>,
    ) -> Result<(), SessionError> {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(session = %self.session_id, "reply task failed: {}", e);
                self.context.relay.close_open_segment().await;
                ReplyOutcome {
                    generated: Err(SessionError::Generation(e.to_string())),
                    relay: None,
                }
            }
        };

        let mut terminal = None;
        match outcome.relay {
            Some(Ok(report)) => self.stats.record_audio(report.chunks, report.bytes),
            Some(Err(e)) if e.is_terminal() => terminal = Some(e),
            Some(Err(e)) => {
                tracing::warn!(session = %self.session_id, "reply audio failed: {}", e);
                self.stats.record_synthesis_failure();
            }
            None => {}
        }
        if outcome.generated.is_err() {
            self.stats.record_generation_failure();
        }

        match self.machine.on_reply_finished(outcome.generated) {
            ReplyVerdict::Delivered { interview_complete } => {
                self.stats.record_reply();
                if interview_complete && terminal.is_none() {
                    tracing::info!(session = %self.session_id, "interview complete");
                    self.context
                        .outbound
                        .send(ServerEvent::InterviewComplete)
                        .await
                        .map_err(|_| SessionError::Transport("client channel closed".into()))?;
                }
            }
            ReplyVerdict::Failed => {}
        }
        if let Some(e) = terminal {
            return Err(e);
        }

        if let Some(request) = self.machine.try_dispatch() {
            self.spawn_reply(request);
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(reply) = self.reply.take() {
            tracing::debug!(session = %self.session_id, "cancelling in-flight reply");
            reply.abort();
            let _ = reply.await;
        }
        if self.context.relay.close_open_segment().await {
            tracing::debug!(session = %self.session_id, "closed interrupted audio segment");
        }
    }
}

async fn silence(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_reply(
    reply: &mut Option<JoinHandle<ReplyOutcome>>,
) -> Result<ReplyOutcome, JoinError> {
    match reply {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn deliver_reply(
    context: ReplyContext,
    request: TurnRequest,
    delay: Option<Duration>,
) -> ReplyOutcome {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let generated = match tokio::time::timeout(
        context.generation_timeout,
        context.generator.generate(&request),
    )
    .await
    {
        Ok(generated) => generated,
        Err(_) => Err(SessionError::Generation(format!(
            "no reply within {:?}",
            context.generation_timeout
        ))),
    };
    let text = match &generated {
        Ok(text) => text.clone(),
        Err(_) => {
            return ReplyOutcome {
                generated,
                relay: None,
            };
        }
    };

    if context
        .outbound
        .send(ServerEvent::ReplyText { text: text.clone() })
        .await
        .is_err()
    {
        return ReplyOutcome {
            generated,
            relay: Some(Err(SessionError::Transport("client channel closed".into()))),
        };
    }

    let relay = match context.synthesizer.synthesize(&text).await {
        Ok(stream) => context.relay.relay(stream).await,
        Err(e) => Err(e),
    };
    ReplyOutcome {
        generated,
        relay: Some(relay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThinkingDelay;
    use crate::generator::{MockResponseGenerator, TurnKind};
    use crate::testing::{FakeSynthesizer, ScriptedGenerator};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const THRESHOLD: Duration = Duration::from_millis(1200);

    fn questions(list: &[&str]) -> QuestionList {
        list.iter().map(|q| q.to_string()).collect()
    }

    fn quiet_config() -> TurnConfig {
        TurnConfig {
            greet_on_start: false,
            ..TurnConfig::default()
        }
    }

    fn final_text(text: &str) -> RecognitionEvent {
        RecognitionEvent::Final { text: text.into() }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn spawn_actor(
        config: TurnConfig,
        questions: QuestionList,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: FakeSynthesizer,
    ) -> (
        mpsc::Sender<RecognitionEvent>,
        mpsc::Receiver<ServerEvent>,
        JoinHandle<ActorReport>,
    ) {
        let (turn_tx, turn_rx) = mpsc::channel(32);
        let (out_tx, out_rx) = mpsc::channel(256);
        let actor = TurnActor::new(
            Uuid::new_v4(),
            config,
            questions,
            generator,
            Arc::new(synthesizer),
            out_tx,
        );
        (turn_tx, out_rx, tokio::spawn(actor.run(turn_rx)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_dispatches_last_final_once() {
        // Arrange
        let generator = ScriptedGenerator::new(vec![Ok("Got it. Why this role?".into())]);
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            quiet_config(),
            questions(&["Why this role?"]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"mp3-1", b"mp3-2"]),
        );
        let start = Instant::now();

        // Act
        turn_tx.send(final_text("I worked on a logging pipeline")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        turn_tx
            .send(final_text("I worked on a logging pipeline at Acme"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        let waited = calls[0].at - start;
        assert!(waited >= Duration::from_millis(300) + THRESHOLD, "dispatched after {:?}", waited);
        assert!(waited < Duration::from_millis(1550), "dispatched after {:?}", waited);
        assert_eq!(
            calls[0].request.history,
            vec![HistoryEntry::user("I worked on a logging pipeline at Acme")]
        );
        assert_eq!(report.cursor, 1);
        assert_eq!(
            report
                .history
                .iter()
                .filter(|e| e.role == crate::Role::User)
                .count(),
            1
        );
        assert!(report.exit.is_ok());

        let events = drain(&mut out_rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::ReplyText {
                    text: "Got it. Why this role?".into()
                },
                ServerEvent::audio_begin("audio/mpeg"),
                ServerEvent::AudioChunk(bytes::Bytes::from_static(b"mp3-1")),
                ServerEvent::AudioChunk(bytes::Bytes::from_static(b"mp3-2")),
                ServerEvent::AudioEnd,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_speech_during_reply_waits_for_guard() {
        // Arrange
        let generator = ScriptedGenerator::new(vec![]).with_latency(Duration::from_secs(2));
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            quiet_config(),
            questions(&["Q1", "Q2", "Q3"]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"a"]),
        );

        // Act
        turn_tx.send(final_text("First answer here")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1300)).await;
        turn_tx.send(final_text("Also I mentored two engineers")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1300)).await;
        let calls_while_in_flight = generator.calls().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        assert_eq!(calls_while_in_flight, 1);
        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(generator.max_active(), 1);
        assert_eq!(
            calls[1].request.history.last(),
            Some(&HistoryEntry::user("Also I mentored two engineers"))
        );
        assert_eq!(calls[1].request.next_question.as_deref(), Some("Q2"));
        assert_eq!(report.cursor, 2);

        let begins = drain(&mut out_rx)
            .into_iter()
            .filter(|e| e.is_audio_framing())
            .map(|e| matches!(e, ServerEvent::AudioBegin { .. }))
            .collect::<Vec<_>>();
        // begin, chunk, end per reply, never interleaved
        assert_eq!(begins, vec![true, false, false, true, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_delay_precedes_generation_inside_guard() {
        // Arrange
        let pause = Duration::from_millis(800);
        let generator = ScriptedGenerator::new(vec![]);
        let (turn_tx, _out_rx, actor) = spawn_actor(
            TurnConfig {
                thinking_delay: Some(ThinkingDelay::new(pause, pause)),
                ..quiet_config()
            },
            questions(&["Q1", "Q2", "Q3"]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"a"]),
        );
        let start = Instant::now();

        // Act: the second answer lands while the first turn is still pausing.
        turn_tx.send(final_text("I shipped the billing rewrite")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        turn_tx.send(final_text("It cut invoice errors in half")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        let calls_during_pause = generator.calls().len();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        assert_eq!(calls_during_pause, 0);
        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(generator.max_active(), 1);
        let first = calls[0].at - start;
        assert!(first >= THRESHOLD + pause, "first call after {:?}", first);
        assert!(first < THRESHOLD + pause + Duration::from_millis(50), "first call after {:?}", first);
        let second = calls[1].at - start;
        let expected = Duration::from_millis(1500) + THRESHOLD + pause;
        assert!(second >= expected, "second call after {:?}", second);
        assert!(second < expected + Duration::from_millis(50), "second call after {:?}", second);
        assert_eq!(
            calls[1].request.history.last(),
            Some(&HistoryEntry::user("It cut invoice errors in half"))
        );
        assert_eq!(report.cursor, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_keeps_cursor() {
        // Arrange
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut generator = MockResponseGenerator::new();
        let counter = attempts.clone();
        generator.expect_generate().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SessionError::Generation("provider timeout".into()))
            } else {
                Ok("Thanks. Q2?".into())
            }
        });
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            quiet_config(),
            questions(&["Q1", "Q2"]),
            Arc::new(generator),
            FakeSynthesizer::new(&[b"a"]),
        );

        // Act
        turn_tx.send(final_text("My first answer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let after_failure = drain(&mut out_rx);
        turn_tx.send(final_text("Let me try again")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        assert!(after_failure.is_empty());
        assert_eq!(report.cursor, 1);
        assert_eq!(
            report.history,
            vec![
                HistoryEntry::user("My first answer"),
                HistoryEntry::user("Let me try again"),
                HistoryEntry::assistant("Thanks. Q2?"),
            ]
        );
        assert_eq!(report.stats.generation_failures(), 1);
        assert_eq!(report.stats.replies_delivered(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_failure_still_closes_segment() {
        // Arrange
        let generator = ScriptedGenerator::new(vec![Ok("Tell me about Q1.".into())]);
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            quiet_config(),
            questions(&["Q1"]),
            Arc::new(generator),
            FakeSynthesizer::new(&[b"a", b"b", b"c"]).failing_after(1),
        );

        // Act
        turn_tx.send(final_text("Here is my answer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        let events = drain(&mut out_rx);
        assert_eq!(
            events[1..],
            [
                ServerEvent::audio_begin("audio/mpeg"),
                ServerEvent::AudioChunk(bytes::Bytes::from_static(b"a")),
                ServerEvent::AudioEnd,
            ]
        );
        assert_eq!(report.stats.synthesis_failures(), 1);
        assert!(report.exit.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_in_flight_generation() {
        // Arrange
        let generator = ScriptedGenerator::new(vec![]).hanging();
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            quiet_config(),
            questions(&["Q1"]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"a"]),
        );
        turn_tx.send(final_text("An answer in progress")).await.unwrap();
        generator.wait_started().await;

        // Act
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        assert_eq!(generator.cancelled(), 1);
        assert_eq!(report.cursor, 0);
        assert!(drain(&mut out_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_turn_then_completion() {
        // Arrange
        let generator = ScriptedGenerator::new(vec![
            Ok("Welcome! Tell me about yourself.".into()),
            Ok("Thank you, that is all.".into()),
        ]);
        let (turn_tx, mut out_rx, actor) = spawn_actor(
            TurnConfig::default(),
            questions(&["Tell me about yourself."]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"a"]),
        );

        // Act
        tokio::time::sleep(Duration::from_millis(100)).await;
        turn_tx.send(final_text("I am a backend engineer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        turn_tx.send(final_text("Oh and one more thing")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].request.kind, TurnKind::Opening);
        assert_eq!(calls[1].request.next_question, None);
        assert!(report.interview_complete);
        let events = drain(&mut out_rx);
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == ServerEvent::InterviewComplete)
                .count(),
            1
        );
        assert_eq!(events.last(), Some(&ServerEvent::InterviewComplete));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout_is_recoverable() {
        // Arrange
        let config = TurnConfig {
            generation_timeout: Duration::from_secs(1),
            ..quiet_config()
        };
        let generator = ScriptedGenerator::new(vec![]).with_latency(Duration::from_secs(10));
        let (turn_tx, _out_rx, actor) = spawn_actor(
            config,
            questions(&["Q1"]),
            Arc::new(generator.clone()),
            FakeSynthesizer::new(&[b"a"]),
        );

        // Act
        turn_tx.send(final_text("A slow answer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(turn_tx);
        let report = actor.await.unwrap();

        // Assert
        assert_eq!(generator.cancelled(), 1);
        assert_eq!(report.stats.generation_failures(), 1);
        assert_eq!(report.cursor, 0);
    }
}
