use async_trait::async_trait;
use futures::StreamExt;
use interview_core::{SessionError, SynthesisFrame, SynthesisStream, Synthesizer};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const MIME_TYPE: &str = "audio/mpeg";
const FRAME_CAPACITY: usize = 32;

/// Streams replies from the OpenAI speech endpoint as mp3.
pub struct OpenAiSynthesizer {
    client: Client,
    api_key: SecretString,
    model: String,
    voice: String,
    endpoint: String,
}

impl OpenAiSynthesizer {
    pub fn new(api_key: SecretString, model: String, voice: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            voice,
            endpoint: SPEECH_URL.to_string(),
        }
    }

    fn body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3"
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesisStream, SessionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.body(text))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SessionError::Synthesis(e.to_string()))?;

        let (stream, frames) = SynthesisStream::channel(MIME_TYPE, FRAME_CAPACITY);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let frame = match chunk {
                    Ok(chunk) => SynthesisFrame::Chunk(chunk),
                    Err(e) => {
                        tracing::warn!("speech stream failed: {}", e);
                        let _ = frames.send(SynthesisFrame::Failed(e.to_string())).await;
                        return;
                    }
                };
                if frames.send(frame).await.is_err() {
                    tracing::debug!("speech stream abandoned");
                    return;
                }
            }
            let _ = frames.send(SynthesisFrame::End).await;
        });
        Ok(stream)
    }
}
