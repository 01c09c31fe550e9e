use interview_types::{ErrorKind, ProtocolError};

/// Failure reported by a decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    /// The decoder cannot take data right now. Retried, never surfaced.
    #[error("append rejected: {0}")]
    AppendRejected(String),

    #[error("decoder I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("input audio error: {0}")]
    Input(#[from] hound::Error),

    #[error("unsupported input audio: {0}")]
    UnsupportedInput(String),

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("server ended the session ({kind}): {message}")]
    Session { kind: ErrorKind, message: String },
}
