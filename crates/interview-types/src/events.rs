use crate::ErrorKind;
use bytes::Bytes;

/// Events sent from the interview client to the orchestrator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Ask the server to open a recognition stream and start the interview.
    #[serde(rename = "start-stream")]
    StartStream,
    /// Ask the server to end the interview without closing the socket.
    #[serde(rename = "stop-stream")]
    StopStream,
    /// One frame of raw captured audio. Sent as a binary frame.
    #[serde(skip)]
    AudioStream(Bytes),
}

/// Events sent from the orchestrator to the interview client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The recognition stream is open; the client may begin sending audio.
    #[serde(rename = "ready")]
    Ready,
    /// Display-only partial transcript.
    #[serde(rename = "transcript-interim")]
    TranscriptInterim { text: String },
    /// Display-only settled transcript.
    #[serde(rename = "transcript-final")]
    TranscriptFinal { text: String },
    /// Text of the reply about to be spoken.
    #[serde(rename = "reply-text")]
    ReplyText { text: String },
    /// A synthesized reply starts; chunks that follow use this encoding.
    #[serde(rename = "audio-begin")]
    AudioBegin {
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// One ordered fragment of the current reply. Sent as a binary frame.
    #[serde(skip)]
    AudioChunk(Bytes),
    /// The current reply's audio is complete.
    #[serde(rename = "audio-end")]
    AudioEnd,
    /// The closing statement has been delivered.
    #[serde(rename = "interview-complete")]
    InterviewComplete,
    /// Fatal session error. The server closes the session after sending it.
    #[serde(rename = "session-error")]
    SessionError { kind: ErrorKind, message: String },
}

impl ServerEvent {
    pub fn audio_begin(mime_type: &str) -> Self {
        ServerEvent::AudioBegin {
            mime_type: mime_type.to_string(),
        }
    }

    pub fn session_error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::SessionError {
            kind,
            message: message.into(),
        }
    }

    /// Whether the event belongs to a reply's `begin`/`chunk`/`end` framing.
    pub fn is_audio_framing(&self) -> bool {
        matches!(
            self,
            ServerEvent::AudioBegin { .. } | ServerEvent::AudioChunk(_) | ServerEvent::AudioEnd
        )
    }
}
