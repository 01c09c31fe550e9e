use crate::audio::PcmClip;
use crate::error::ClientError;
use crate::playback::{DecoderFactory, PlaybackAction, PlaybackBuffer, PlaybackStats};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use interview_types::{ClientEvent, Frame, ServerEvent};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub url: String,
    /// Audio sent per binary frame, also the pacing interval.
    pub frame: Duration,
    /// How long to keep listening for replies after the clip has been sent.
    pub linger: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub frames_sent: usize,
    pub replies_saved: usize,
    pub interview_complete: bool,
    pub playback: PlaybackStats,
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(data) => Message::Binary(data.to_vec()),
    }
}

fn to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text)),
        Message::Binary(data) => Some(Frame::Binary(Bytes::from(data))),
        _ => None,
    }
}

async fn send_event<S>(sink: &mut S, event: &ClientEvent) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(to_message(event.to_frame()?)).await?;
    Ok(())
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn linger_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Streams `clip` to the server in real-time paced frames and plays every reply
/// segment through a [`PlaybackBuffer`] backed by `factory`.
pub async fn run_interview<F: DecoderFactory>(
    options: &SessionOptions,
    clip: &PcmClip,
    factory: &mut F,
) -> Result<RunSummary, ClientError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(options.url.as_str()).await?;
    tracing::info!("Connected to {}", options.url);
    let (mut write, mut read) = ws_stream.split();

    send_event(&mut write, &ClientEvent::StartStream).await?;

    let frames = clip.frames(options.frame);
    let mut summary = RunSummary::default();
    let mut buffer: PlaybackBuffer<F::Decoder> = PlaybackBuffer::new();
    let mut ticker = tokio::time::interval(options.frame);
    let mut streaming = false;
    let mut retry: Option<Pin<Box<Sleep>>> = None;
    let mut linger_deadline = None;

    loop {
        let action = tokio::select! {
            message = read.next() => {
                let Some(message) = message else {
                    tracing::info!("server closed the connection");
                    break;
                };
                let message = message?;
                if let Message::Close(reason) = &message {
                    tracing::info!("server closed the connection: {:?}", reason);
                    break;
                }
                let Some(frame) = to_frame(message) else {
                    continue;
                };
                match ServerEvent::from_frame(frame)? {
                    ServerEvent::Ready => {
                        tracing::info!("recognition ready, streaming {} frames", frames.len());
                        streaming = true;
                        PlaybackAction::Wait
                    }
                    ServerEvent::TranscriptInterim { text } => {
                        tracing::debug!("hearing: {}", text);
                        PlaybackAction::Wait
                    }
                    ServerEvent::TranscriptFinal { text } => {
                        println!("candidate: {text}");
                        PlaybackAction::Wait
                    }
                    ServerEvent::ReplyText { text } => {
                        println!("interviewer: {text}");
                        PlaybackAction::Wait
                    }
                    ServerEvent::AudioBegin { mime_type } => {
                        buffer.begin(factory.create(&mime_type)?);
                        buffer.decoder_ready()?
                    }
                    ServerEvent::AudioChunk(chunk) => buffer.chunk(chunk)?,
                    ServerEvent::AudioEnd => buffer.end()?,
                    ServerEvent::InterviewComplete => {
                        println!("interview complete");
                        summary.interview_complete = true;
                        PlaybackAction::Wait
                    }
                    ServerEvent::SessionError { kind, message } => {
                        return Err(ClientError::Session { kind, message });
                    }
                }
            }
            _ = ticker.tick(), if streaming && summary.frames_sent < frames.len() => {
                let frame = frames[summary.frames_sent].clone();
                send_event(&mut write, &ClientEvent::AudioStream(frame)).await?;
                summary.frames_sent += 1;
                if summary.frames_sent == frames.len() {
                    tracing::info!("finished sending audio, waiting for replies");
                    linger_deadline = Some(Instant::now() + options.linger);
                }
                PlaybackAction::Wait
            }
            _ = retry_elapsed(&mut retry) => {
                retry = None;
                buffer.retry_elapsed()?
            }
            _ = linger_elapsed(linger_deadline) => {
                tracing::info!("no more replies expected");
                break;
            }
        };

        match action {
            PlaybackAction::Wait => {}
            PlaybackAction::ScheduleRetry(delay) => {
                retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            PlaybackAction::Finished => summary.replies_saved += 1,
        }
        if summary.interview_complete && !buffer.is_segment_open() {
            break;
        }
    }

    if let Err(e) = send_event(&mut write, &ClientEvent::StopStream).await {
        tracing::debug!("failed to send stop-stream: {}", e);
    }
    let _ = write.close().await;
    summary.playback = buffer.stats();
    Ok(summary)
}
