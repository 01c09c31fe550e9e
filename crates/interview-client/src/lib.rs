//! Command-line interview client: streams recorded speech to an interview
//! server and reassembles the spoken replies.

pub mod audio;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod playback;

pub use audio::PcmClip;
pub use connection::{RunSummary, SessionOptions, run_interview};
pub use decoder::{FileDecoder, FileDecoderFactory};
pub use error::{ClientError, DecoderError};
pub use playback::{DecoderFactory, MediaDecoder, PlaybackAction, PlaybackBuffer, PlaybackStats};
