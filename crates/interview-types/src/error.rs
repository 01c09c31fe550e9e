use std::fmt;

/// Category of a failure reported to the client in a `session-error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The duplex channel broke.
    Transport,
    /// The speech recognition provider failed to connect or dropped the stream.
    RecognitionProvider,
    /// The reply generator failed or timed out.
    Generation,
    /// The speech synthesis provider failed mid-reply.
    Synthesis,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::RecognitionProvider => "recognition-provider",
            ErrorKind::Generation => "generation",
            ErrorKind::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// A frame could not be turned into an event, or an event into a frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
