use crate::error::ClientError;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

/// Raw little-endian 16-bit PCM read from a WAV file.
#[derive(Debug, Clone)]
pub struct PcmClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub data: Vec<u8>,
}

impl PcmClip {
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(ClientError::UnsupportedInput(format!(
                "{} must be 16-bit integer PCM, found {:?} {}-bit",
                path.display(),
                spec.sample_format,
                spec.bits_per_sample
            )));
        }
        let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        })
    }

    /// Fails unless the clip matches the format the server transcribes.
    pub fn ensure_format(&self, sample_rate: u32, channels: u16) -> Result<(), ClientError> {
        if self.sample_rate != sample_rate || self.channels != channels {
            return Err(ClientError::UnsupportedInput(format!(
                "server expects {} Hz audio with {} channel(s), input is {} Hz with {}",
                sample_rate, channels, self.sample_rate, self.channels
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        let bytes_per_second = self.sample_rate as u64 * self.channels as u64 * 2;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.data.len() as u64 * 1000 / bytes_per_second)
    }

    /// Splits the clip into frames covering `frame` of audio each. The last
    /// frame may be shorter.
    pub fn frames(&self, frame: Duration) -> Vec<Bytes> {
        let bytes_per_sample_frame = self.channels.max(1) as usize * 2;
        let sample_frames = (self.sample_rate as u128 * frame.as_millis() / 1000).max(1) as usize;
        let frame_len = sample_frames * bytes_per_sample_frame;
        self.data
            .chunks(frame_len)
            .map(Bytes::copy_from_slice)
            .collect()
    }
}
