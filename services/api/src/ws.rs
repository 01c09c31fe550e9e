use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use interview_core::{Session, SessionDeps, SessionEnd};
use interview_types::{ClientEvent, Frame, ServerEvent};
use tokio::sync::mpsc;

const EVENT_QUEUE_CAPACITY: usize = 256;

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes),
    }
}

/// Maps an inbound socket message to a client event. `None` means the
/// message carries nothing for the session.
fn parse_message(message: Message) -> Option<ClientEvent> {
    let frame = match message {
        Message::Text(text) => Frame::Text(text.to_string()),
        Message::Binary(bytes) => Frame::Binary(bytes),
        _ => return None,
    };
    match ClientEvent::from_frame(frame) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("ignoring malformed client message: {}", e);
            None
        }
    }
}

/// Runs one interview session over an upgraded socket.
pub async fn handle_socket(socket: WebSocket, deps: SessionDeps) {
    let (mut sink, mut stream) = socket.split();
    let (in_tx, in_rx) = mpsc::channel::<ClientEvent>(EVENT_QUEUE_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(EVENT_QUEUE_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("failed to encode server event: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(to_message(frame)).await {
                tracing::debug!("client socket closed while sending: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(Message::Close(_)) => break,
                Ok(message) => message,
                Err(e) => {
                    tracing::info!("WebSocket error: {}", e);
                    break;
                }
            };
            if let Some(event) = parse_message(message) {
                if in_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut session = Session::new(deps);
    let summary = session.run(in_rx, out_tx).await;
    reader.abort();
    if let Err(e) = writer.await {
        tracing::warn!("socket writer task failed: {}", e);
    }

    match &summary.end {
        SessionEnd::Failed(e) => tracing::warn!(session = %summary.id, "session failed: {}", e),
        end => tracing::info!(session = %summary.id, "session ended: {:?}", end),
    }
    tracing::info!(
        session = %summary.id,
        "questions asked: {}, replies: {}, audio bytes: {}, complete: {}",
        summary.questions_asked,
        summary.stats.replies_delivered(),
        summary.stats.audio_bytes(),
        summary.interview_complete
    );
}
