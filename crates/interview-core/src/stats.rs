/// Per-session counters, owned by the turn actor and reported at teardown.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionStats {
    turns_dispatched: u64,
    replies_delivered: u64,
    generation_failures: u64,
    synthesis_failures: u64,
    audio_chunks: u64,
    audio_bytes: u64,
}

impl SessionStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&mut self) {
        self.turns_dispatched += 1;
    }

    pub(crate) fn record_reply(&mut self) {
        self.replies_delivered += 1;
    }

    pub(crate) fn record_generation_failure(&mut self) {
        self.generation_failures += 1;
    }

    pub(crate) fn record_synthesis_failure(&mut self) {
        self.synthesis_failures += 1;
    }

    pub(crate) fn record_audio(&mut self, chunks: u64, bytes: u64) {
        self.audio_chunks += chunks;
        self.audio_bytes += bytes;
    }

    pub fn turns_dispatched(&self) -> u64 {
        self.turns_dispatched
    }

    pub fn replies_delivered(&self) -> u64 {
        self.replies_delivered
    }

    pub fn generation_failures(&self) -> u64 {
        self.generation_failures
    }

    pub fn synthesis_failures(&self) -> u64 {
        self.synthesis_failures
    }

    pub fn audio_chunks(&self) -> u64 {
        self.audio_chunks
    }

    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes
    }
}
