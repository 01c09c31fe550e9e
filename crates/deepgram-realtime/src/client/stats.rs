#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    audio_bytes_sent: u64,
    interim_results: u64,
    final_results: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_audio(&mut self, bytes: usize) {
        self.audio_bytes_sent += bytes as u64;
    }

    pub(crate) fn record_result(&mut self, is_final: bool) {
        if is_final {
            self.final_results += 1;
        } else {
            self.interim_results += 1;
        }
    }

    pub fn audio_bytes_sent(&self) -> u64 {
        self.audio_bytes_sent
    }

    pub fn interim_results(&self) -> u64 {
        self.interim_results
    }

    pub fn final_results(&self) -> u64 {
        self.final_results
    }
}
