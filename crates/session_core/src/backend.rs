//! Completion backends. Each adapter translates the canonical transcript into
//! its own wire shape and hands back the assistant reply text.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use shared::{
    domain::{Message, Role},
    protocol::{ChatReply, ChatRequest, CompletionRequest, CompletionResponse},
};
use tracing::debug;

use crate::{
    config::{BackendKind, Settings},
    error::TurnError,
};

pub const COMPLETION_MAX_TOKENS: u32 = 4096;
pub const COMPLETION_TEMPERATURE: f32 = 1.0;
pub const COMPLETION_TOP_P: f32 = 1.0;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `transcript` always ends with the user message of the turn being sent.
    async fn send_turn(&self, transcript: &[Message]) -> Result<String, TurnError>;
}

/// Sends the whole transcript and reads the first returned choice.
pub struct FullHistoryBackend {
    http: Client,
    endpoint: String,
    credential: String,
    model: String,
}

impl FullHistoryBackend {
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_client(Client::new(), endpoint, credential, model)
    }

    pub fn with_client(
        http: Client,
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            credential: credential.into(),
            model: model.into(),
        }
    }

    fn request_body(&self, transcript: &[Message]) -> CompletionRequest {
        CompletionRequest {
            messages: transcript.to_vec(),
            max_tokens: COMPLETION_MAX_TOKENS,
            temperature: COMPLETION_TEMPERATURE,
            top_p: COMPLETION_TOP_P,
            frequency_penalty: None,
            presence_penalty: None,
            model: self.model.clone(),
        }
    }
}

#[async_trait]
impl CompletionBackend for FullHistoryBackend {
    fn name(&self) -> &'static str {
        "full_history"
    }

    async fn send_turn(&self, transcript: &[Message]) -> Result<String, TurnError> {
        debug!(
            endpoint = %self.endpoint,
            messages = transcript.len(),
            "dispatching full-history completion"
        );
        let request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.credential);
        let body = post_json(request, &self.request_body(transcript)).await?;
        parse_completion_body(&body)
    }
}

/// Sends only the latest user message to `<base_url>/chat`.
pub struct ChatProxyBackend {
    http: Client,
    base_url: String,
}

impl ChatProxyBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for ChatProxyBackend {
    fn name(&self) -> &'static str {
        "chat_proxy"
    }

    async fn send_turn(&self, transcript: &[Message]) -> Result<String, TurnError> {
        let last = transcript
            .last()
            .filter(|message| message.role == Role::User)
            .ok_or(TurnError::MissingUserTurn)?;
        let url = self.chat_url();
        debug!(%url, "dispatching single-turn chat request");
        let body = post_json(
            self.http.post(&url),
            &ChatRequest {
                message: last.content.clone(),
            },
        )
        .await?;
        parse_chat_reply_body(&body)
    }
}

pub fn backend_from_settings(settings: &Settings) -> Arc<dyn CompletionBackend> {
    match settings.backend {
        BackendKind::FullHistory => Arc::new(FullHistoryBackend::new(
            settings.completion_url.clone(),
            settings.completion_api_key.clone(),
            settings.completion_model.clone(),
        )),
        BackendKind::ChatProxy => Arc::new(ChatProxyBackend::new(settings.proxy_base_url.clone())),
    }
}

/// POSTs `body` as JSON and returns the raw response text of a 2xx answer.
///
/// Once headers have arrived the failure is a protocol one: an error status
/// is reported even if its body cannot be read, and a body that breaks off
/// mid-read is a decode failure.
pub async fn post_json<B: Serialize + ?Sized>(
    request: RequestBuilder,
    body: &B,
) -> Result<String, TurnError> {
    let response = request.json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TurnError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .text()
        .await
        .map_err(|err| TurnError::Decode(err.to_string()))
}

/// Model name (when reported) and the first choice's content.
pub fn decode_completion(body: &str) -> Result<(Option<String>, String), TurnError> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    let message = response.first_message().ok_or(TurnError::EmptyChoices)?;
    let content = message.content.clone().ok_or(TurnError::MissingContent)?;
    Ok((response.model, content))
}

pub(crate) fn parse_completion_body(body: &str) -> Result<String, TurnError> {
    decode_completion(body).map(|(_, content)| content)
}

pub(crate) fn parse_chat_reply_body(body: &str) -> Result<String, TurnError> {
    let reply: ChatReply = serde_json::from_str(body)?;
    Ok(reply.reply)
}
