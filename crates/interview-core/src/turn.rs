use crate::config::TurnConfig;
use crate::generator::{TurnKind, TurnRequest};
use crate::history::ConversationHistory;
use crate::recognition::RecognitionEvent;
use crate::script::{QuestionList, QuestionScript};
use crate::SessionError;
use tokio::time::Instant;

/// Observable phase of the turn-taking protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Listening,
    /// A final transcript is waiting for its silence window.
    UtterancePending,
    /// The silence window elapsed while a reply was still in flight.
    Debouncing,
    Responding,
}

#[derive(Debug)]
struct PendingTurn {
    text: String,
    deadline: Instant,
    elapsed: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    kind: TurnKind,
    concludes: bool,
}

/// How a finished reply was folded back into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVerdict {
    Delivered { interview_complete: bool },
    Failed,
}

/// Turn-taking decisions for one session.
///
/// The machine is synchronous and owns the history and question cursor. Time is
/// passed in by the caller, which makes every transition deterministic; the
/// [`crate::actor::TurnActor`] supplies the clock, the debounce timer and the
/// generator calls.
#[derive(Debug)]
pub struct TurnMachine {
    config: TurnConfig,
    history: ConversationHistory,
    script: QuestionScript,
    pending: Option<PendingTurn>,
    in_flight: Option<InFlight>,
    last_activity: Option<Instant>,
    finished: bool,
}

impl TurnMachine {
    pub fn new(config: TurnConfig, questions: QuestionList) -> Self {
        Self {
            history: ConversationHistory::new(config.history_limit),
            script: QuestionScript::new(questions),
            config,
            pending: None,
            in_flight: None,
            last_activity: None,
            finished: false,
        }
    }

    pub fn state(&self) -> TurnState {
        match (&self.in_flight, &self.pending) {
            (Some(_), _) => TurnState::Responding,
            (None, Some(pending)) if pending.elapsed => TurnState::Debouncing,
            (None, Some(_)) => TurnState::UtterancePending,
            (None, None) => TurnState::Listening,
        }
    }

    /// Opening turn, dispatched before the candidate speaks.
    pub fn start(&mut self) -> Option<TurnRequest> {
        if !self.config.greet_on_start || self.in_flight.is_some() || self.finished {
            return None;
        }
        Some(self.dispatch(TurnKind::Opening))
    }

    /// Applies one recognition event. Returns whether it replaced the pending
    /// utterance.
    pub fn on_recognition(&mut self, event: RecognitionEvent, now: Instant) -> bool {
        match event {
            RecognitionEvent::Interim { .. } => {
                self.last_activity = Some(now);
                false
            }
            RecognitionEvent::Final { text } => {
                self.last_activity = Some(now);
                let text = text.trim();
                if text.chars().count() < self.config.min_speech_length {
                    tracing::debug!("discarding short final transcript {:?}", text);
                    return false;
                }
                if self.finished {
                    tracing::debug!("interview is complete, ignoring final transcript");
                    return false;
                }
                self.pending = Some(PendingTurn {
                    text: text.to_string(),
                    deadline: now + self.config.silence_threshold,
                    elapsed: false,
                });
                true
            }
            RecognitionEvent::UtteranceEnd => false,
        }
    }

    /// When the debounce timer for the pending utterance fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .filter(|pending| !pending.elapsed)
            .map(|pending| pending.deadline)
    }

    /// Marks the pending utterance's silence window as elapsed and dispatches it
    /// if no reply is in flight.
    pub fn on_silence_elapsed(&mut self, now: Instant) -> Option<TurnRequest> {
        if let Some(pending) = self.pending.as_mut() {
            if now >= pending.deadline {
                pending.elapsed = true;
            }
        }
        self.try_dispatch()
    }

    /// Dispatches a held utterance once the guard is clear.
    pub fn try_dispatch(&mut self) -> Option<TurnRequest> {
        if self.in_flight.is_some() || self.finished {
            return None;
        }
        if !self.pending.as_ref().is_some_and(|pending| pending.elapsed) {
            return None;
        }
        let pending = self.pending.take()?;
        self.history.push_user(pending.text);
        Some(self.dispatch(TurnKind::Answer))
    }

    fn dispatch(&mut self, kind: TurnKind) -> TurnRequest {
        let next_question = self.script.current().map(str::to_string);
        self.in_flight = Some(InFlight {
            kind,
            concludes: next_question.is_none(),
        });
        TurnRequest {
            kind,
            history: self.history.snapshot(),
            next_question,
        }
    }

    /// Clears the single-in-flight guard. A generated reply is recorded and
    /// advances the cursor; a failure leaves both history and cursor alone.
    pub fn on_reply_finished(&mut self, reply: Result<String, SessionError>) -> ReplyVerdict {
        let Some(in_flight) = self.in_flight.take() else {
            tracing::warn!("reply finished with no turn in flight");
            return ReplyVerdict::Failed;
        };
        match reply {
            Ok(text) => {
                self.history.push_assistant(text);
                self.script.advance();
                if in_flight.concludes {
                    self.finished = true;
                    self.pending = None;
                }
                tracing::debug!(kind = ?in_flight.kind, cursor = self.script.cursor(), "reply recorded");
                ReplyVerdict::Delivered {
                    interview_complete: in_flight.concludes,
                }
            }
            Err(e) => {
                tracing::warn!(kind = ?in_flight.kind, "reply failed: {}", e);
                ReplyVerdict::Failed
            }
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn cursor(&self) -> usize {
        self.script.cursor()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pending_text(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.text.as_str())
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
}
