use crate::SessionError;
use crate::history::HistoryEntry;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_PERSONA: &str = "You are a friendly, professional interviewer conducting a spoken \
interview. Keep every reply short enough to be said aloud in under thirty seconds. Never use \
lists, markdown or emoji.";

const DEFAULT_OPENING: &str = "Greet the candidate warmly in one or two sentences, explain that \
this is a short voice interview, then ask this first question: \"{question}\"";

const DEFAULT_ADVANCE: &str = "Briefly acknowledge the candidate's last answer. If something \
important was unclear you may ask one short clarifying follow-up. Then move naturally into this \
question: \"{question}\". Never say \"next question\".";

const DEFAULT_CONCLUDE: &str = "All questions have been covered. Thank the candidate for their \
time, acknowledge their last answer, and close the interview in two or three sentences. Do not \
ask any further questions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The interviewer speaks first, before the candidate has said anything.
    Opening,
    /// A reply to a finished candidate answer.
    Answer,
}

/// Everything the generator needs for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub kind: TurnKind,
    pub history: Vec<HistoryEntry>,
    /// The scripted question to move into, or `None` when the script is exhausted.
    pub next_question: Option<String>,
}

impl TurnRequest {
    /// Whether the reply is the closing statement.
    pub fn concludes(&self) -> bool {
        self.next_question.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Persona and per-turn instruction templates. `{question}` is replaced by the
/// scripted question the reply should lead into.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub persona: String,
    pub opening: String,
    pub advance: String,
    pub conclude: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            opening: DEFAULT_OPENING.to_string(),
            advance: DEFAULT_ADVANCE.to_string(),
            conclude: DEFAULT_CONCLUDE.to_string(),
        }
    }
}

impl PromptSet {
    /// Builds a prompt set from named templates, falling back to the built-in
    /// text for any key that is missing.
    pub fn from_map(prompts: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            prompts
                .get(key)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or(fallback)
        };
        Self {
            persona: pick("persona", defaults.persona),
            opening: pick("opening", defaults.opening),
            advance: pick("advance", defaults.advance),
            conclude: pick("conclude", defaults.conclude),
        }
    }

    pub fn instruction(&self, request: &TurnRequest) -> String {
        match (&request.next_question, request.kind) {
            (None, _) => self.conclude.clone(),
            (Some(question), TurnKind::Opening) => self.opening.replace("{question}", question),
            (Some(question), TurnKind::Answer) => self.advance.replace("{question}", question),
        }
    }

    /// Full prompt: persona, then the bounded history, then this turn's instruction.
    pub fn messages(&self, request: &TurnRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: self.persona.clone(),
        });
        for entry in &request.history {
            let role = match entry.role {
                crate::Role::User => "user",
                crate::Role::Assistant => "assistant",
            };
            messages.push(ChatMessage {
                role,
                content: entry.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "system",
            content: self.instruction(request),
        });
        messages
    }
}

// Generators are swapped out with `MockResponseGenerator` in tests so turn
// handling can be exercised without network calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &TurnRequest) -> Result<String, SessionError>;
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completions backed generator.
pub struct ChatGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    prompts: PromptSet,
}

impl ChatGenerator {
    pub fn new(api_key: String, model: String, prompts: PromptSet) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
            prompts,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    async fn complete(&self, request: &TurnRequest) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": self.prompts.messages(request),
            "temperature": 0.7
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<LlmResponse>()
            .await?;

        let answer = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content
            .unwrap_or_default();
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(anyhow::anyhow!("LLM returned an empty reply"));
        }
        Ok(answer.to_string())
    }
}

#[async_trait]
impl ResponseGenerator for ChatGenerator {
    async fn generate(&self, request: &TurnRequest) -> Result<String, SessionError> {
        self.complete(request)
            .await
            .map_err(|e| SessionError::Generation(format!("{e:#}")))
    }
}
