//! Hand-written adapters for exercising sessions and the turn actor.

use crate::generator::{ResponseGenerator, TurnRequest};
use crate::recognition::{AudioConfig, ProviderEnd, RecognitionStream, Recognizer};
use crate::synthesis::{SynthesisFrame, SynthesisStream, Synthesizer};
use crate::SessionError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

/// Hands the provider side of every opened stream to the test.
pub struct FakeRecognizer {
    refuse: Option<String>,
    providers: mpsc::UnboundedSender<ProviderEnd>,
}

impl FakeRecognizer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProviderEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                refuse: None,
                providers: tx,
            },
            rx,
        )
    }

    pub fn refusing(message: &str) -> Self {
        let (mut recognizer, _) = Self::new();
        recognizer.refuse = Some(message.to_string());
        recognizer
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn open(&self, _audio: &AudioConfig) -> Result<RecognitionStream, SessionError> {
        if let Some(message) = &self.refuse {
            return Err(SessionError::RecognitionProvider(message.clone()));
        }
        let (stream, provider) = RecognitionStream::pair(64);
        let _ = self.providers.send(provider);
        Ok(stream)
    }
}

/// Emits a fixed list of chunks per reply, optionally failing part way.
pub struct FakeSynthesizer {
    chunks: Vec<Bytes>,
    fail_after: Option<usize>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl FakeSynthesizer {
    pub fn new(chunks: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            fail_after: None,
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    pub fn texts(&self) -> Arc<Mutex<Vec<String>>> {
        self.texts.clone()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesisStream, SessionError> {
        self.texts.lock().unwrap().push(text.to_string());
        let (stream, frames) = SynthesisStream::channel("audio/mpeg", self.chunks.len() + 1);
        for (i, chunk) in self.chunks.iter().enumerate() {
            if self.fail_after == Some(i) {
                let _ = frames.try_send(SynthesisFrame::Failed("voice backend reset".into()));
                return Ok(stream);
            }
            let _ = frames.try_send(SynthesisFrame::Chunk(chunk.clone()));
        }
        let _ = frames.try_send(SynthesisFrame::End);
        Ok(stream)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub at: Instant,
    pub request: TurnRequest,
}

/// Generator that replays canned replies and records how it was called.
#[derive(Clone)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, SessionError>>>>,
    calls: Arc<Mutex<Vec<GeneratorCall>>>,
    latency: Option<Duration>,
    hang: bool,
    started: Arc<Notify>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, SessionError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: None,
            hang: false,
            started: Arc::new(Notify::new()),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Never returns; only cancellation ends the call.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct CallGuard {
    active: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, request: &TurnRequest) -> Result<String, SessionError> {
        self.calls.lock().unwrap().push(GeneratorCall {
            at: Instant::now(),
            request: request.clone(),
        });
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let mut guard = CallGuard {
            active: self.active.clone(),
            cancelled: self.cancelled.clone(),
            finished: false,
        };
        self.started.notify_one();

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        guard.finished = true;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Thanks, tell me more.".to_string()))
    }
}
