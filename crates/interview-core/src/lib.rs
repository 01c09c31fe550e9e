//! Orchestration core for a live voice interview.
//!
//! A [`session::Session`] owns one duplex channel. Audio goes to a
//! [`recognition::Recognizer`]; recognition events feed a single-writer
//! [`actor::TurnActor`] which decides when the candidate has finished a turn,
//! asks a [`generator::ResponseGenerator`] for the interviewer's reply, and
//! relays the synthesized audio back through [`relay::AudioRelay`].

pub mod actor;
pub mod config;
pub mod error;
pub mod generator;
pub mod history;
pub mod recognition;
pub mod relay;
pub mod script;
pub mod session;
pub mod stats;
pub mod synthesis;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::{ActorReport, TurnActor};
pub use config::{ThinkingDelay, TurnConfig};
pub use error::SessionError;
pub use generator::{ChatGenerator, PromptSet, ResponseGenerator, TurnKind, TurnRequest};
pub use history::{ConversationHistory, HistoryEntry, Role};
pub use recognition::{
    AudioConfig, ProviderEnd, ReadyState, RecognitionEvent, RecognitionStream, RecognitionUpdate,
    Recognizer,
};
pub use relay::{AudioRelay, RelayReport};
pub use script::{QuestionList, QuestionScript, parse_questions};
pub use session::{Session, SessionDeps, SessionEnd, SessionState, SessionSummary};
pub use stats::SessionStats;
pub use synthesis::{SynthesisFrame, SynthesisStream, Synthesizer};
pub use turn::{ReplyVerdict, TurnMachine, TurnState};
