use crate::{ClientEvent, ProtocolError, ServerEvent};
use bytes::Bytes;

/// A single message on the duplex channel, independent of the transport crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl ClientEvent {
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        match self {
            ClientEvent::AudioStream(audio) => Ok(Frame::Binary(audio.clone())),
            event => Ok(Frame::Text(serde_json::to_string(event)?)),
        }
    }

    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        match frame {
            Frame::Binary(audio) => Ok(ClientEvent::AudioStream(audio)),
            Frame::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        match self {
            ServerEvent::AudioChunk(chunk) => Ok(Frame::Binary(chunk.clone())),
            event => Ok(Frame::Text(serde_json::to_string(event)?)),
        }
    }

    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        match frame {
            Frame::Binary(chunk) => Ok(ServerEvent::AudioChunk(chunk)),
            Frame::Text(text) => Ok(serde_json::from_str(&text)?),
        }
    }
}
