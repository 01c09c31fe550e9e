//! Client-side reassembly of a streamed reply.
//!
//! Appends to an incremental decoder are not re-entrant, so every chunk passes
//! through one gate: chunks wait in arrival order until the decoder is ready
//! and idle, and a rejected append is parked in a single retry slot until the
//! retry delay elapses. The buffer never sleeps or spawns on its own; the
//! driver feeds it inputs and acts on the returned [`PlaybackAction`].

use crate::error::DecoderError;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;

pub const RETRY_DELAY: Duration = Duration::from_millis(50);

/// An incremental media decoder for one audio segment.
pub trait MediaDecoder {
    /// Starts appending `chunk`. While [`MediaDecoder::updating`] reports true
    /// afterwards, the driver must report completion with
    /// [`PlaybackBuffer::update_end`].
    fn append(&mut self, chunk: &[u8]) -> Result<(), DecoderError>;

    fn updating(&self) -> bool;

    /// Finalizes the segment.
    fn end_of_stream(&mut self) -> Result<(), DecoderError>;
}

/// Creates a fresh decoder for each segment.
pub trait DecoderFactory {
    type Decoder: MediaDecoder;

    fn create(&mut self, mime_type: &str) -> Result<Self::Decoder, DecoderError>;
}

/// What the driver has to do after feeding an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Nothing until the next input.
    Wait,
    /// Call [`PlaybackBuffer::retry_elapsed`] after the delay.
    ScheduleRetry(Duration),
    /// The segment was finalized and its decoder released.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Idle,
    Busy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub appended_chunks: u64,
    pub appended_bytes: u64,
    pub retries: u64,
    pub dropped_chunks: u64,
}

pub struct PlaybackBuffer<D: MediaDecoder> {
    decoder: Option<D>,
    decoder_ready: bool,
    gate: Gate,
    pending: VecDeque<Bytes>,
    retry: Option<Bytes>,
    retry_armed: bool,
    end_requested: bool,
    stats: PlaybackStats,
}

impl<D: MediaDecoder> Default for PlaybackBuffer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: MediaDecoder> PlaybackBuffer<D> {
    pub fn new() -> Self {
        Self {
            decoder: None,
            decoder_ready: false,
            gate: Gate::Idle,
            pending: VecDeque::new(),
            retry: None,
            retry_armed: false,
            end_requested: false,
            stats: PlaybackStats::default(),
        }
    }

    /// Starts a segment with a freshly created decoder. A segment that never
    /// saw its end is discarded.
    pub fn begin(&mut self, decoder: D) {
        if self.decoder.is_some() {
            tracing::warn!(
                "discarding unfinished segment with {} queued chunks",
                self.queued()
            );
        }
        self.decoder = Some(decoder);
        self.decoder_ready = false;
        self.gate = Gate::Idle;
        self.pending.clear();
        self.retry = None;
        self.retry_armed = false;
        self.end_requested = false;
    }

    pub fn decoder_ready(&mut self) -> Result<PlaybackAction, DecoderError> {
        if self.decoder.is_none() {
            return Ok(PlaybackAction::Wait);
        }
        self.decoder_ready = true;
        self.pump()
    }

    pub fn chunk(&mut self, chunk: Bytes) -> Result<PlaybackAction, DecoderError> {
        if self.decoder.is_none() || self.end_requested {
            tracing::warn!("dropping {} byte chunk outside of a segment", chunk.len());
            self.stats.dropped_chunks += 1;
            return Ok(PlaybackAction::Wait);
        }
        self.pending.push_back(chunk);
        self.pump()
    }

    /// The decoder finished the append it was busy with.
    pub fn update_end(&mut self) -> Result<PlaybackAction, DecoderError> {
        self.gate = Gate::Idle;
        self.pump()
    }

    pub fn retry_elapsed(&mut self) -> Result<PlaybackAction, DecoderError> {
        self.retry_armed = false;
        self.pump()
    }

    /// Ends the segment. Finalization waits until every queued chunk is in.
    pub fn end(&mut self) -> Result<PlaybackAction, DecoderError> {
        if self.decoder.is_none() {
            return Ok(PlaybackAction::Wait);
        }
        self.end_requested = true;
        self.pump()
    }

    pub fn is_segment_open(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.gate == Gate::Busy
    }

    /// Chunks received but not yet appended, including one waiting for a retry.
    pub fn queued(&self) -> usize {
        self.pending.len() + usize::from(self.retry.is_some())
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    fn pump(&mut self) -> Result<PlaybackAction, DecoderError> {
        loop {
            if !self.decoder_ready || self.gate == Gate::Busy || self.retry_armed {
                return Ok(PlaybackAction::Wait);
            }
            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(PlaybackAction::Wait);
            };

            let Some(chunk) = self.retry.take().or_else(|| self.pending.pop_front()) else {
                if !self.end_requested {
                    return Ok(PlaybackAction::Wait);
                }
                return match decoder.end_of_stream() {
                    Ok(()) => {
                        self.decoder = None;
                        self.decoder_ready = false;
                        self.end_requested = false;
                        Ok(PlaybackAction::Finished)
                    }
                    Err(DecoderError::AppendRejected(reason)) => {
                        tracing::debug!("finalize rejected, retrying: {}", reason);
                        Ok(self.arm_retry())
                    }
                    Err(e) => {
                        self.decoder = None;
                        self.decoder_ready = false;
                        self.end_requested = false;
                        Err(e)
                    }
                };
            };

            match decoder.append(&chunk) {
                Ok(()) => {
                    self.stats.appended_chunks += 1;
                    self.stats.appended_bytes += chunk.len() as u64;
                    if decoder.updating() {
                        self.gate = Gate::Busy;
                    }
                }
                Err(DecoderError::AppendRejected(reason)) => {
                    tracing::debug!("append rejected, retrying: {}", reason);
                    self.retry = Some(chunk);
                    return Ok(self.arm_retry());
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn arm_retry(&mut self) -> PlaybackAction {
        self.retry_armed = true;
        self.stats.retries += 1;
        PlaybackAction::ScheduleRetry(RETRY_DELAY)
    }
}
