use crate::SessionError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Normalized output of a streaming recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Partial text that later events for the same utterance supersede.
    Interim { text: String },
    /// Settled text for the utterance.
    Final { text: String },
    /// The provider detected the end of an utterance.
    UtteranceEnd,
}

/// Everything a recognition stream reports to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionUpdate {
    /// The provider accepted the stream; audio written from now on is forwarded.
    Opened,
    Event(RecognitionEvent),
    /// Connection, auth or streaming failure. Nothing follows it.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
struct ReadyGate(Arc<Mutex<ReadyState>>);

impl ReadyGate {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ReadyState::Connecting)))
    }

    fn get(&self) -> ReadyState {
        match self.0.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, next: ReadyState) -> ReadyState {
        let mut state = match self.0.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Closed is terminal, and only a connecting stream can open.
        let allowed = match (*state, next) {
            (ReadyState::Closed, _) => false,
            (ReadyState::Open, ReadyState::Open) => false,
            _ => true,
        };
        if allowed {
            *state = next;
        }
        *state
    }
}

/// Audio parameters of the captured stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encoding: "linear16".to_string(),
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Opens recognition streams against a speech-to-text provider.
///
/// `open` returns as soon as the stream exists. The provider connection may
/// still be in progress; readiness is reported with [`RecognitionUpdate::Opened`]
/// and a failed connection with [`RecognitionUpdate::Failed`]. Implementations
/// never retry on their own.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn open(&self, audio: &AudioConfig) -> Result<RecognitionStream, SessionError>;
}

/// Session side of a recognition stream.
#[derive(Debug)]
pub struct RecognitionStream {
    gate: ReadyGate,
    audio_tx: Option<mpsc::Sender<Bytes>>,
    updates: mpsc::Receiver<RecognitionUpdate>,
}

/// Provider side of a recognition stream, held by a [`Recognizer`] implementation.
#[derive(Debug)]
pub struct ProviderEnd {
    gate: ReadyGate,
    audio_rx: mpsc::Receiver<Bytes>,
    updates: mpsc::Sender<RecognitionUpdate>,
}

impl RecognitionStream {
    pub fn pair(capacity: usize) -> (RecognitionStream, ProviderEnd) {
        let capacity = capacity.max(1);
        let gate = ReadyGate::new();
        let (audio_tx, audio_rx) = mpsc::channel(capacity);
        let (updates_tx, updates_rx) = mpsc::channel(capacity);
        let stream = RecognitionStream {
            gate: gate.clone(),
            audio_tx: Some(audio_tx),
            updates: updates_rx,
        };
        let provider = ProviderEnd {
            gate,
            audio_rx,
            updates: updates_tx,
        };
        (stream, provider)
    }

    pub fn ready_state(&self) -> ReadyState {
        self.gate.get()
    }

    /// Forwards one audio frame, waiting while the provider is behind. Frames
    /// written while the stream is not open are dropped without error. Returns
    /// whether the frame was forwarded.
    pub async fn write(&self, audio: Bytes) -> bool {
        if self.gate.get() != ReadyState::Open {
            tracing::trace!("dropping {} bytes of audio, stream not open", audio.len());
            return false;
        }
        let Some(tx) = &self.audio_tx else {
            return false;
        };
        tx.send(audio).await.is_ok()
    }

    /// Next update from the provider. `None` once the provider side is gone.
    pub async fn next_update(&mut self) -> Option<RecognitionUpdate> {
        self.updates.recv().await
    }

    /// Stops forwarding audio. The provider flushes and releases its connection
    /// once it sees the audio channel close.
    pub fn close(&mut self) {
        self.gate.set(ReadyState::Closed);
        self.audio_tx = None;
    }
}

impl Drop for RecognitionStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl ProviderEnd {
    /// Marks the stream open. Returns false if the session already closed it.
    pub async fn opened(&self) -> bool {
        if self.gate.set(ReadyState::Open) != ReadyState::Open {
            return false;
        }
        self.updates.send(RecognitionUpdate::Opened).await.is_ok()
    }

    pub async fn emit(&self, event: RecognitionEvent) -> bool {
        self.updates
            .send(RecognitionUpdate::Event(event))
            .await
            .is_ok()
    }

    pub async fn fail(&self, message: impl Into<String>) {
        self.gate.set(ReadyState::Closed);
        let _ = self
            .updates
            .send(RecognitionUpdate::Failed(message.into()))
            .await;
    }

    /// Next audio frame. `None` once the session closed the stream.
    pub async fn next_audio(&mut self) -> Option<Bytes> {
        self.audio_rx.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.gate.get() == ReadyState::Closed
    }
}
