pub const DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";

pub const BASE_URL: &str = "wss://api.deepgram.com/v1";
pub const DEFAULT_MODEL: &str = "nova-2";
pub const DEFAULT_ENCODING: &str = "linear16";
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const DEFAULT_UTTERANCE_END_MS: u32 = 1000;
pub const DEFAULT_ENDPOINTING_MS: u32 = 300;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 5;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
