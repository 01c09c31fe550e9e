use crate::client::stats::Stats;
use crate::types::{self, ControlMessage};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite::Message;

pub(crate) mod config;
mod consts;
pub(crate) mod stats;
mod utils;

/// What the writer task puts on the socket.
#[derive(Debug)]
enum Outgoing {
    Audio(Vec<u8>),
    Control(ControlMessage),
}

type ClientTx = tokio::sync::mpsc::Sender<Outgoing>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

// Holds the channel capacity, the transmitters for both halves of the socket,
// and usage stats guarded by a Mutex.
pub struct Client {
    capacity: usize,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            c_tx: None,
            s_tx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self, config: &config::Config) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(config).context("Failed to build listen request")?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("Failed to connect to Deepgram listen socket")?;
        tracing::info!("Connected to Deepgram listen socket");

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<Outgoing>(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());

        // Writer: forwards audio and control messages, keeps the socket alive
        // through silences, and closes the stream once every sender is gone.
        let keep_alive_period = config.keep_alive();
        let writer_stats = self.stats.clone();
        tokio::spawn(async move {
            let mut keep_alive = tokio::time::interval(keep_alive_period);
            keep_alive.tick().await;
            loop {
                tokio::select! {
                    outgoing = c_rx.recv() => {
                        let message = match outgoing {
                            Some(Outgoing::Audio(audio)) => {
                                if let Ok(mut stats) = writer_stats.lock() {
                                    stats.record_audio(audio.len());
                                }
                                Message::Binary(audio)
                            }
                            Some(Outgoing::Control(control)) => match serde_json::to_string(&control) {
                                Ok(text) => Message::Text(text),
                                Err(e) => {
                                    tracing::error!("failed to serialize control message: {}", e);
                                    continue;
                                }
                            },
                            None => {
                                // Flush whatever the provider still holds, then hang up.
                                if let Ok(text) = serde_json::to_string(&ControlMessage::CloseStream) {
                                    if let Err(e) = write.send(Message::Text(text)).await {
                                        tracing::debug!("failed to send CloseStream: {}", e);
                                    }
                                }
                                let _ = write.close().await;
                                break;
                            }
                        };
                        if let Err(e) = write.send(message).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    _ = keep_alive.tick() => {
                        if let Ok(text) = serde_json::to_string(&ControlMessage::KeepAlive) {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send KeepAlive: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
            tracing::debug!("Deepgram writer task finished");
        });

        // Reader: parses provider messages and broadcasts them to subscribers.
        let reader_stats = self.stats.clone();
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(types::ServerEvent::Close {
                            reason: Some(e.to_string()),
                        });
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerEvent>(&text) {
                        Ok(event) => {
                            if let types::ServerEvent::Results(ref results) = event {
                                if let Ok(mut stats) = reader_stats.lock() {
                                    stats.record_result(results.is_final());
                                }
                            }
                            if let Err(e) = s_tx.send(event) {
                                tracing::debug!("no subscriber for provider event: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message of {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = types::ServerEvent::Close {
                            reason: reason.map(|v| format!("{:?}", v)),
                        };
                        if let Err(e) = s_tx.send(close_event) {
                            tracing::debug!("failed to send close event: {}", e);
                        }
                        break;
                    }
                    _ => {}
                }
            }
        });
        Ok(())
    }

    /// Subscribe to parsed provider events.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    async fn send(&self, outgoing: Outgoing) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(outgoing)
                    .await
                    .map_err(|_| anyhow::anyhow!("listen socket writer has stopped"))?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Send one frame of raw audio in the configured encoding.
    pub async fn send_audio(&self, audio: Vec<u8>) -> Result<()> {
        self.send(Outgoing::Audio(audio)).await
    }

    /// Ask the provider to finalize whatever audio it has buffered.
    pub async fn finalize(&self) -> Result<()> {
        self.send(Outgoing::Control(ControlMessage::Finalize)).await
    }

    /// Stop sending. The writer flushes with `CloseStream` and closes the socket.
    pub fn close(&mut self) {
        self.c_tx = None;
    }
}

/// Connect with a specific channel capacity and config.
pub async fn connect_with_config(capacity: usize, config: &config::Config) -> Result<Client> {
    let mut client = Client::new(capacity);
    client.connect(config).await?;
    Ok(client)
}

/// Connect with default settings, taking the API key from the environment.
pub async fn connect() -> Result<Client> {
    let config = config::Config::new();
    connect_with_config(1024, &config).await
}
