use crate::SessionError;
use crate::synthesis::{SynthesisFrame, SynthesisStream};
use interview_types::ServerEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub chunks: u64,
    pub bytes: u64,
}

/// Frames synthesized audio onto the client channel as `audio-begin`,
/// `audio-chunk`* and `audio-end`.
///
/// Clones share the open-segment flag, so whoever tears the session down can
/// close a segment that a cancelled relay left open.
#[derive(Debug, Clone)]
pub struct AudioRelay {
    outbound: mpsc::Sender<ServerEvent>,
    segment_open: Arc<AtomicBool>,
}

impl AudioRelay {
    pub fn new(outbound: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            outbound,
            segment_open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_segment_open(&self) -> bool {
        self.segment_open.load(Ordering::SeqCst)
    }

    async fn send(&self, event: ServerEvent) -> Result<(), SessionError> {
        self.outbound
            .send(event)
            .await
            .map_err(|_| SessionError::Transport("client channel closed".into()))
    }

    /// Relays one reply. `audio-end` is sent whenever `audio-begin` was, including
    /// when the stream fails or is cut off.
    pub async fn relay(&self, mut stream: SynthesisStream) -> Result<RelayReport, SessionError> {
        self.send(ServerEvent::audio_begin(stream.mime_type())).await?;
        self.segment_open.store(true, Ordering::SeqCst);

        let mut report = RelayReport::default();
        let result = loop {
            match stream.next().await {
                Some(SynthesisFrame::Chunk(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    report.chunks += 1;
                    report.bytes += chunk.len() as u64;
                    if let Err(e) = self.send(ServerEvent::AudioChunk(chunk)).await {
                        break Err(e);
                    }
                }
                Some(SynthesisFrame::End) => break Ok(()),
                Some(SynthesisFrame::Failed(message)) => break Err(SessionError::Synthesis(message)),
                None => {
                    break Err(SessionError::Synthesis(
                        "synthesis stream stopped before its end marker".into(),
                    ));
                }
            }
        };
        drop(stream);

        let end = self.send(ServerEvent::AudioEnd).await;
        self.segment_open.store(false, Ordering::SeqCst);
        result.and(end).map(|_| report)
    }

    /// Sends `audio-end` for a segment whose relay was cancelled. Returns whether
    /// a segment was open.
    pub async fn close_open_segment(&self) -> bool {
        if !self.segment_open.swap(false, Ordering::SeqCst) {
            return false;
        }
        if self.send(ServerEvent::AudioEnd).await.is_err() {
            tracing::debug!("client gone before the open audio segment could be closed");
        }
        true
    }
}
