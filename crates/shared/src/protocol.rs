use serde::{Deserialize, Serialize};

use crate::domain::{Message, Role};

/// Body of a full-history completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

/// Candidate message as returned by a completion endpoint. `content` is
/// nullable on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    pub fn first_message(&self) -> Option<&CompletionMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

/// Body of a single-turn proxy request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub reply: String,
}
