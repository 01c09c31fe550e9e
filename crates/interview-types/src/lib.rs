//! Wire protocol spoken between an interview client and the orchestrator.
//!
//! Control events travel as JSON text frames tagged by a kebab-case `type`
//! field. Audio payloads never go through JSON: client microphone frames and
//! synthesized reply chunks are carried as binary frames.

pub mod error;
pub mod events;
pub mod frame;

pub use error::{ErrorKind, ProtocolError};
pub use events::{ClientEvent, ServerEvent};
pub use frame::Frame;
