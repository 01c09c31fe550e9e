use interview_core::{AudioConfig, ThinkingDelay, TurnConfig};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub deepgram_api_key: SecretString,
    pub deepgram_model: String,
    pub openai_api_key: SecretString,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub turn: TurnConfig,
    pub audio: AudioConfig,
    pub prompts_dir: PathBuf,
    pub questions_path: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, reading a `.env` file
    /// first when one exists.
    ///
    /// *   `BIND_ADDRESS`: Address to listen on. Defaults to "0.0.0.0:3000".
    /// *   `DEEPGRAM_API_KEY`: Required. Speech recognition.
    /// *   `DEEPGRAM_MODEL`: Recognition model. Defaults to "nova-2".
    /// *   `OPENAI_API_KEY`: Required. Reply generation and speech synthesis.
    /// *   `CHAT_MODEL`: Defaults to "gpt-4o-mini".
    /// *   `TTS_MODEL` / `TTS_VOICE`: Default to "tts-1" / "alloy".
    /// *   `SILENCE_THRESHOLD_MS`, `MIN_SPEECH_LENGTH`, `CONVERSATION_HISTORY_LIMIT`,
    ///     `GENERATION_TIMEOUT_MS`, `GREET_ON_START`: Turn-taking policy.
    /// *   `THINKING_DELAY_MIN_MS` / `THINKING_DELAY_MAX_MS`: Optional, set both or neither.
    /// *   `AUDIO_ENCODING` / `AUDIO_SAMPLE_RATE` / `AUDIO_CHANNELS`: Format of the
    ///     client's audio. Default to "linear16" / 16000 / 1.
    /// *   `PROMPTS_DIR` / `QUESTIONS_PATH`: Default to "prompts" / "questions.json".
    /// *   `RUST_LOG`: The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<SecretString, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let defaults = TurnConfig::default();
        let thinking_delay = match (
            parse_opt::<u64, _>(&lookup, "THINKING_DELAY_MIN_MS")?,
            parse_opt::<u64, _>(&lookup, "THINKING_DELAY_MAX_MS")?,
        ) {
            (Some(min), Some(max)) => Some(ThinkingDelay::new(
                Duration::from_millis(min),
                Duration::from_millis(max),
            )),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "THINKING_DELAY_MIN_MS".to_string(),
                    "THINKING_DELAY_MIN_MS and THINKING_DELAY_MAX_MS must be set together"
                        .to_string(),
                ));
            }
        };
        let turn = TurnConfig {
            silence_threshold: parse_opt::<u64, _>(&lookup, "SILENCE_THRESHOLD_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.silence_threshold),
            min_speech_length: parse_opt(&lookup, "MIN_SPEECH_LENGTH")?
                .unwrap_or(defaults.min_speech_length),
            history_limit: parse_opt(&lookup, "CONVERSATION_HISTORY_LIMIT")?
                .unwrap_or(defaults.history_limit),
            thinking_delay,
            generation_timeout: parse_opt::<u64, _>(&lookup, "GENERATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.generation_timeout),
            greet_on_start: parse_opt(&lookup, "GREET_ON_START")?
                .unwrap_or(defaults.greet_on_start),
        };
        if turn.history_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "CONVERSATION_HISTORY_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let audio_defaults = AudioConfig::default();
        let audio = AudioConfig {
            encoding: text("AUDIO_ENCODING", &audio_defaults.encoding),
            sample_rate: parse_opt(&lookup, "AUDIO_SAMPLE_RATE")?
                .unwrap_or(audio_defaults.sample_rate),
            channels: parse_opt(&lookup, "AUDIO_CHANNELS")?.unwrap_or(audio_defaults.channels),
        };
        if audio.sample_rate == 0 || audio.channels == 0 {
            return Err(ConfigError::InvalidValue(
                "AUDIO_SAMPLE_RATE".to_string(),
                "sample rate and channel count must be positive".to_string(),
            ));
        }

        let log_level_str = text("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address: parse_opt(&lookup, "BIND_ADDRESS")?
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000))),
            deepgram_api_key: required("DEEPGRAM_API_KEY")?,
            deepgram_model: text("DEEPGRAM_MODEL", "nova-2"),
            openai_api_key: required("OPENAI_API_KEY")?,
            chat_model: text("CHAT_MODEL", "gpt-4o-mini"),
            tts_model: text("TTS_MODEL", "tts-1"),
            tts_voice: text("TTS_VOICE", "alloy"),
            turn,
            audio,
            prompts_dir: PathBuf::from(text("PROMPTS_DIR", "prompts")),
            questions_path: PathBuf::from(text("QUESTIONS_PATH", "questions.json")),
            log_level,
        })
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
