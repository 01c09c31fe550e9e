// Outgoing control messages. Audio itself is sent as raw binary frames.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    KeepAlive,
    CloseStream,
    Finalize,
}

// Incoming messages
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    Results(ResultsEvent),
    UtteranceEnd(UtteranceEndEvent),
    SpeechStarted(SpeechStartedEvent),
    Metadata(MetadataEvent),
    Error(ErrorEvent),
    /// Emitted locally when the socket closes; never sent by the provider.
    #[serde(skip)]
    Close { reason: Option<String> },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResultsEvent {
    channel: ResultsChannel,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    speech_final: bool,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResultsChannel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

impl ResultsEvent {
    /// Transcript of the most likely alternative, or an empty string.
    pub fn transcript(&self) -> &str {
        self.channel
            .alternatives
            .first()
            .map(|a| a.transcript.as_str())
            .unwrap_or("")
    }

    pub fn confidence(&self) -> f64 {
        self.channel
            .alternatives
            .first()
            .map(|a| a.confidence)
            .unwrap_or(0.0)
    }

    /// The provider will not revise this segment any more.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The provider's endpointing detected a pause after this segment.
    pub fn speech_final(&self) -> bool {
        self.speech_final
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct UtteranceEndEvent {
    #[serde(default)]
    last_word_end: f64,
}

impl UtteranceEndEvent {
    pub fn last_word_end(&self) -> f64 {
        self.last_word_end
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SpeechStartedEvent {
    #[serde(default)]
    timestamp: f64,
}

impl SpeechStartedEvent {
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MetadataEvent {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    duration: f64,
}

impl MetadataEvent {
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    variant: Option<String>,
}

impl ErrorEvent {
    pub fn message(&self) -> &str {
        self.description
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("unknown provider error")
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_results() {
        let text = r#"{
            "type": "Results",
            "channel_index": [0, 1],
            "duration": 1.04,
            "start": 2.5,
            "is_final": true,
            "speech_final": false,
            "channel": {
                "alternatives": [
                    { "transcript": "I worked on a logging pipeline", "confidence": 0.98, "words": [] }
                ]
            },
            "metadata": { "request_id": "abc" }
        }"#;

        let event: ServerEvent = serde_json::from_str(text).unwrap();
        match event {
            ServerEvent::Results(results) => {
                assert_eq!(results.transcript(), "I worked on a logging pipeline");
                assert!(results.is_final());
                assert!(!results.speech_final());
                assert_eq!(results.start(), 2.5);
            }
            other => panic!("Expected Results, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_results_without_alternatives() {
        let text = r#"{"type":"Results","channel":{"alternatives":[]}}"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        match event {
            ServerEvent::Results(results) => {
                assert_eq!(results.transcript(), "");
                assert!(!results.is_final());
            }
            other => panic!("Expected Results, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_utterance_end() {
        let text = r#"{"type":"UtteranceEnd","channel":[0,1],"last_word_end":2.395}"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        assert!(matches!(event, ServerEvent::UtteranceEnd(e) if e.last_word_end() == 2.395));
    }

    #[test]
    fn test_control_messages_are_type_tagged() {
        assert_eq!(
            serde_json::to_string(&ControlMessage::CloseStream).unwrap(),
            r#"{"type":"CloseStream"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControlMessage::KeepAlive).unwrap(),
            r#"{"type":"KeepAlive"}"#
        );
    }
}
