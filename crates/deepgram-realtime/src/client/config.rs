use crate::client::consts::{
    BASE_URL, DEEPGRAM_API_KEY, DEFAULT_ENCODING, DEFAULT_ENDPOINTING_MS, DEFAULT_KEEP_ALIVE_SECS,
    DEFAULT_MODEL, DEFAULT_SAMPLE_RATE, DEFAULT_UTTERANCE_END_MS,
};
use secrecy::SecretString;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
    encoding: String,
    sample_rate: u32,
    channels: u16,
    utterance_end_ms: u32,
    endpointing_ms: u32,
    smart_format: bool,
    keep_alive: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.config.encoding = encoding.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn with_utterance_end_ms(mut self, utterance_end_ms: u32) -> Self {
        self.config.utterance_end_ms = utterance_end_ms;
        self
    }

    pub fn with_endpointing_ms(mut self, endpointing_ms: u32) -> Self {
        self.config.endpointing_ms = endpointing_ms;
        self
    }

    pub fn with_smart_format(mut self, smart_format: bool) -> Self {
        self.config.smart_format = smart_format;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Sets the default values. The API key falls back to the environment.
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            api_key: std::env::var(DEEPGRAM_API_KEY)
                .unwrap_or_else(|_| "".to_string())
                .into(),
            model: DEFAULT_MODEL.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            utterance_end_ms: DEFAULT_UTTERANCE_END_MS,
            endpointing_ms: DEFAULT_ENDPOINTING_MS,
            smart_format: true,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn utterance_end_ms(&self) -> u32 {
        self.utterance_end_ms
    }

    pub fn endpointing_ms(&self) -> u32 {
        self.endpointing_ms
    }

    pub fn smart_format(&self) -> bool {
        self.smart_format
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
