use crate::client::config::Config;
use crate::client::consts::AUTHORIZATION_HEADER;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let url = format!(
        "{}/listen?model={}&encoding={}&sample_rate={}&channels={}&interim_results=true&utterance_end_ms={}&vad_events=true&endpointing={}&smart_format={}",
        config.base_url(),
        config.model(),
        config.encoding(),
        config.sample_rate(),
        config.channels(),
        config.utterance_end_ms(),
        config.endpointing_ms(),
        config.smart_format(),
    );
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Token {}", config.api_key().expose_secret())
            .as_str()
            .parse()?,
    );
    Ok(request)
}
