use async_trait::async_trait;
use deepgram_realtime::types::{ResultsEvent, ServerEvent};
use interview_core::{
    AudioConfig, ProviderEnd, RecognitionEvent, RecognitionStream, Recognizer, SessionError,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast::error::RecvError;

const STREAM_CAPACITY: usize = 256;
const CLIENT_CAPACITY: usize = 1024;

/// Adapts the Deepgram listen socket to the `Recognizer` contract.
pub struct DeepgramRecognizer {
    api_key: SecretString,
    model: String,
}

impl DeepgramRecognizer {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self { api_key, model }
    }

    fn config(&self, audio: &AudioConfig) -> deepgram_realtime::Config {
        deepgram_realtime::Config::builder()
            .with_api_key(self.api_key.expose_secret())
            .with_model(&self.model)
            .with_encoding(&audio.encoding)
            .with_sample_rate(audio.sample_rate)
            .with_channels(audio.channels)
            .build()
    }
}

#[async_trait]
impl Recognizer for DeepgramRecognizer {
    async fn open(&self, audio: &AudioConfig) -> Result<RecognitionStream, SessionError> {
        let (stream, provider) = RecognitionStream::pair(STREAM_CAPACITY);
        let config = self.config(audio);
        // The socket connects in the background; audio written before it is
        // open is dropped by the stream itself.
        tokio::spawn(drive(config, provider));
        Ok(stream)
    }
}

/// Joins the finalized pieces of one utterance.
///
/// Deepgram finalizes long answers in consecutive pieces, each carrying only
/// its own words. Every `Final` emitted here holds the whole utterance so far,
/// and interims are prefixed with what is already settled. The utterance
/// resets after a `speech_final` result or an `UtteranceEnd`.
#[derive(Debug, Default)]
pub struct UtteranceAssembler {
    pieces: Vec<String>,
}

impl UtteranceAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn joined_with(&self, tail: &str) -> String {
        let mut parts: Vec<&str> = self.pieces.iter().map(String::as_str).collect();
        if !tail.is_empty() {
            parts.push(tail);
        }
        parts.join(" ")
    }

    /// Maps a `Results` message onto a recognition event. Empty transcripts
    /// carry nothing and are skipped.
    pub fn on_results(&mut self, results: &ResultsEvent) -> Option<RecognitionEvent> {
        let text = results.transcript().trim();
        if !results.is_final() {
            if text.is_empty() {
                return None;
            }
            return Some(RecognitionEvent::Interim {
                text: self.joined_with(text),
            });
        }

        let event = if text.is_empty() {
            None
        } else {
            self.pieces.push(text.to_string());
            Some(RecognitionEvent::Final {
                text: self.joined_with(""),
            })
        };
        if results.speech_final() {
            self.pieces.clear();
        }
        event
    }

    pub fn on_utterance_end(&mut self) {
        self.pieces.clear();
    }
}

async fn drive(config: deepgram_realtime::Config, mut provider: ProviderEnd) {
    let mut client = match deepgram_realtime::connect_with_config(CLIENT_CAPACITY, &config).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("failed to open recognition stream: {:#}", e);
            provider.fail(format!("{e:#}")).await;
            return;
        }
    };
    let mut events = match client.server_events() {
        Ok(events) => events,
        Err(e) => {
            provider.fail(format!("{e:#}")).await;
            return;
        }
    };
    if !provider.opened().await {
        tracing::debug!("session closed before the recognition stream opened");
        client.close();
        return;
    }

    let mut assembler = UtteranceAssembler::new();
    loop {
        tokio::select! {
            audio = provider.next_audio() => match audio {
                Some(audio) => {
                    if let Err(e) = client.send_audio(audio.to_vec()).await {
                        provider.fail(format!("{e:#}")).await;
                        break;
                    }
                }
                None => {
                    tracing::debug!("recognition stream closed by session");
                    client.close();
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(ServerEvent::Results(results)) => {
                    if let Some(event) = assembler.on_results(&results) {
                        if !provider.emit(event).await {
                            client.close();
                            break;
                        }
                    }
                }
                Ok(ServerEvent::UtteranceEnd(_)) => {
                    assembler.on_utterance_end();
                    if !provider.emit(RecognitionEvent::UtteranceEnd).await {
                        client.close();
                        break;
                    }
                }
                Ok(ServerEvent::SpeechStarted(started)) => {
                    tracing::debug!("speech started at {:.2}s", started.timestamp());
                }
                Ok(ServerEvent::Metadata(metadata)) => {
                    tracing::debug!("recognition metadata: request_id={:?}", metadata.request_id());
                }
                Ok(ServerEvent::Error(error)) => {
                    provider.fail(error.message()).await;
                    break;
                }
                Ok(ServerEvent::Close { reason }) => {
                    if !provider.is_closed() {
                        provider
                            .fail(format!("recognition provider closed the stream: {:?}", reason))
                            .await;
                    }
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("recognition events lagged, skipped {}", skipped);
                }
                Err(RecvError::Closed) => {
                    provider.fail("recognition event channel closed").await;
                    break;
                }
            }
        }
    }

    if let Ok(stats) = client.stats() {
        tracing::debug!(
            audio_bytes = stats.audio_bytes_sent(),
            finals = stats.final_results(),
            interims = stats.interim_results(),
            "recognition stream finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::{TurnConfig, TurnMachine};
    use std::time::Duration;
    use tokio::time::Instant;

    fn results(json: &str) -> ResultsEvent {
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::Results(results) => results,
            other => panic!("Expected Results, got {:?}", other),
        }
    }

    fn piece(transcript: &str, is_final: bool, speech_final: bool) -> ResultsEvent {
        results(&format!(
            r#"{{"type":"Results","is_final":{is_final},"speech_final":{speech_final},"channel":{{"alternatives":[{{"transcript":"{transcript}"}}]}}}}"#
        ))
    }

    #[test]
    fn test_final_and_interim() {
        let mut assembler = UtteranceAssembler::new();

        let interim = assembler.on_results(&piece("I led", false, false));
        let settled = assembler.on_results(&piece(" I led the team ", true, true));

        assert_eq!(interim, Some(RecognitionEvent::Interim { text: "I led".into() }));
        assert_eq!(settled, Some(RecognitionEvent::Final { text: "I led the team".into() }));
    }

    #[test]
    fn test_empty_transcripts_are_skipped() {
        let mut assembler = UtteranceAssembler::new();

        assert_eq!(assembler.on_results(&piece("", true, false)), None);
        assert_eq!(assembler.on_results(&piece("", false, false)), None);
    }

    #[test]
    fn test_final_pieces_join_into_one_utterance() {
        // Arrange
        let mut assembler = UtteranceAssembler::new();

        // Act
        let first = assembler.on_results(&piece("I worked on a logging pipeline", true, false));
        let interim = assembler.on_results(&piece("at Acme", false, false));
        let second = assembler.on_results(&piece("at Acme for three years", true, true));
        let next = assembler.on_results(&piece("Anything else?", true, false));

        // Assert
        assert_eq!(
            first,
            Some(RecognitionEvent::Final { text: "I worked on a logging pipeline".into() })
        );
        assert_eq!(
            interim,
            Some(RecognitionEvent::Interim {
                text: "I worked on a logging pipeline at Acme".into()
            })
        );
        assert_eq!(
            second,
            Some(RecognitionEvent::Final {
                text: "I worked on a logging pipeline at Acme for three years".into()
            })
        );
        assert_eq!(next, Some(RecognitionEvent::Final { text: "Anything else?".into() }));
    }

    #[test]
    fn test_utterance_end_starts_a_new_utterance() {
        let mut assembler = UtteranceAssembler::new();
        assembler.on_results(&piece("My last role was at Acme", true, false));

        assembler.on_utterance_end();
        let event = assembler.on_results(&piece("Sorry, one more thing", true, false));

        assert_eq!(event, Some(RecognitionEvent::Final { text: "Sorry, one more thing".into() }));
    }

    #[test]
    fn test_split_answer_reaches_the_turn_machine_whole() {
        // Arrange
        let mut assembler = UtteranceAssembler::new();
        let mut machine = TurnMachine::new(
            TurnConfig::default(),
            vec!["Tell me about a recent project.".to_string()].into(),
        );
        let start = Instant::now();

        // Act
        for (offset, event) in [
            (0, assembler.on_results(&piece("I worked on a logging pipeline", true, false))),
            (300, assembler.on_results(&piece("at Acme for three years", true, true))),
        ] {
            let event = event.unwrap();
            machine.on_recognition(event, start + Duration::from_millis(offset));
        }

        // Assert
        assert_eq!(
            machine.pending_text(),
            Some("I worked on a logging pipeline at Acme for three years")
        );
    }
}
