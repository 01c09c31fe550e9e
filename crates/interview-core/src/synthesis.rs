use crate::SessionError;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// One item of a synthesized reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisFrame {
    Chunk(Bytes),
    /// Every chunk has been produced.
    End,
    /// The provider failed after the stream was handed out.
    Failed(String),
}

/// Ordered audio for one reply.
///
/// A stream that stops without an [`SynthesisFrame::End`] was cut off, which the
/// consumer treats the same as [`SynthesisFrame::Failed`]. Dropping the stream
/// abandons it; the producer sees its sender close and stops.
#[derive(Debug)]
pub struct SynthesisStream {
    mime_type: String,
    frames: mpsc::Receiver<SynthesisFrame>,
}

impl SynthesisStream {
    /// Creates a stream together with the sender a provider writes frames into.
    pub fn channel(
        mime_type: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<SynthesisFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = Self {
            mime_type: mime_type.into(),
            frames: rx,
        };
        (stream, tx)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub async fn next(&mut self) -> Option<SynthesisFrame> {
        self.frames.recv().await
    }
}

/// Turns reply text into a stream of encoded audio.
///
/// Calls are not serialized here; the turn actor never starts a second
/// synthesis before the previous stream ended or was dropped.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesisStream, SessionError>;
}
