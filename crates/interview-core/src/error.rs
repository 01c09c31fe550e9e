use interview_types::ErrorKind;

/// Failures a session can run into, grouped by how they are recovered.
///
/// `Transport` and `RecognitionProvider` end the session. `Generation` and
/// `Synthesis` are folded back into the turn state machine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("recognition provider error: {0}")]
    RecognitionProvider(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Transport(_) => ErrorKind::Transport,
            SessionError::RecognitionProvider(_) => ErrorKind::RecognitionProvider,
            SessionError::Generation(_) => ErrorKind::Generation,
            SessionError::Synthesis(_) => ErrorKind::Synthesis,
        }
    }

    /// Whether the session has to be torn down.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::RecognitionProvider(_)
        )
    }
}
