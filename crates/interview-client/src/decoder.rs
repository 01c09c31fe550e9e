use crate::error::DecoderError;
use crate::playback::{DecoderFactory, MediaDecoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension for an advertised audio mime type.
pub fn extension_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/aac" => "aac",
        "audio/flac" => "flac",
        "audio/pcm" | "audio/l16" => "pcm",
        _ => "bin",
    }
}

/// Writes a segment's encoded audio to disk as it arrives.
pub struct FileDecoder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes: u64,
}

impl FileDecoder {
    pub fn create(path: &Path) -> Result<Self, DecoderError> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl MediaDecoder for FileDecoder {
    fn append(&mut self, chunk: &[u8]) -> Result<(), DecoderError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(DecoderError::AppendRejected("segment already finalized".into()));
        };
        writer.write_all(chunk)?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    fn updating(&self) -> bool {
        false
    }

    fn end_of_stream(&mut self) -> Result<(), DecoderError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!("saved reply audio to {} ({} bytes)", self.path.display(), self.bytes);
        }
        Ok(())
    }
}

/// Numbers each segment `reply-NNN.<ext>` inside one directory.
pub struct FileDecoderFactory {
    out_dir: PathBuf,
    next_index: usize,
}

impl FileDecoderFactory {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            next_index: 1,
        }
    }

    pub fn created(&self) -> usize {
        self.next_index - 1
    }
}

impl DecoderFactory for FileDecoderFactory {
    type Decoder = FileDecoder;

    fn create(&mut self, mime_type: &str) -> Result<FileDecoder, DecoderError> {
        let name = format!("reply-{:03}.{}", self.next_index, extension_for(mime_type));
        self.next_index += 1;
        FileDecoder::create(&self.out_dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackAction, PlaybackBuffer};
    use bytes::Bytes;
    use tempfile::tempdir;

    #[test]
    fn test_extension_for_common_mime_types() {
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }

    #[test]
    fn test_segments_are_written_to_numbered_files() -> anyhow::Result<()> {
        // Arrange
        let dir = tempdir()?;
        let mut factory = FileDecoderFactory::new(dir.path());
        let mut buffer = PlaybackBuffer::new();

        // Act
        buffer.begin(factory.create("audio/mpeg")?);
        buffer.chunk(Bytes::from_static(b"ID3"))?;
        buffer.decoder_ready()?;
        buffer.chunk(Bytes::from_static(b"frame"))?;
        let action = buffer.end()?;
        buffer.begin(factory.create("audio/mpeg")?);
        buffer.decoder_ready()?;
        buffer.end()?;

        // Assert
        assert_eq!(action, PlaybackAction::Finished);
        assert_eq!(factory.created(), 2);
        assert_eq!(std::fs::read(dir.path().join("reply-001.mp3"))?, b"ID3frame");
        assert!(dir.path().join("reply-002.mp3").exists());
        Ok(())
    }
}
