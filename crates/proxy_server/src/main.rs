use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use clap::Parser;
use reqwest::Client;
use session_core::{
    backend::{decode_completion, post_json},
    TurnError,
};
use shared::{
    domain::Message,
    error::ApiError,
    protocol::{ChatReply, ChatRequest, CompletionRequest},
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings, DEFAULT_SETTINGS_FILE};

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const PROXY_MAX_TOKENS: u32 = 8192;
const PROXY_TEMPERATURE: f32 = 0.7;
const PROXY_TOP_P: f32 = 0.95;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; missing files fall back to defaults and environment.
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Overrides the bind address from settings.
    #[arg(long)]
    bind: Option<String>,
}

struct AppState {
    http: Client,
    upstream: Upstream,
}

/// Where `/chat` requests are forwarded.
#[derive(Debug, Clone)]
struct Upstream {
    url: String,
    api_key: String,
    model: String,
    api_version: Option<String>,
}

impl From<&Settings> for Upstream {
    fn from(settings: &Settings) -> Self {
        Self {
            url: settings.completion_url.clone(),
            api_key: settings.completion_api_key.clone(),
            model: settings.completion_model.clone(),
            api_version: settings.api_version.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(bind) = args.bind {
        settings.server_bind = bind;
    }

    let state = AppState {
        http: Client::new(),
        upstream: Upstream::from(&settings),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, model = %settings.completion_model, "chat proxy listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Error)]
enum ProxyError {
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),
    #[error("upstream completion failed: {0}")]
    Upstream(#[from] TurnError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ProxyError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, ApiError::validation(self.to_string()))
            }
            ProxyError::Upstream(_) => (StatusCode::BAD_GATEWAY, ApiError::upstream(self.to_string())),
        };
        (status, Json(body)).into_response()
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    // Browser front ends are served from a different origin.
    Router::new()
        .route("/healthz", get(healthz))
        .route("/chat", post(chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ProxyError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(status = %rejection.status(), "rejecting unreadable chat request");
        ProxyError::InvalidRequest(rejection.body_text())
    })?;
    let reply = forward_chat(&state.http, &state.upstream, &req.message)
        .await
        .map_err(|e| {
            error!(error = %e, "upstream completion failed");
            ProxyError::from(e)
        })?;
    Ok(Json(reply))
}

fn upstream_request(upstream: &Upstream, user_message: &str) -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::system(SYSTEM_PROMPT), Message::user(user_message)],
        max_tokens: PROXY_MAX_TOKENS,
        temperature: PROXY_TEMPERATURE,
        top_p: PROXY_TOP_P,
        frequency_penalty: Some(0.0),
        presence_penalty: Some(0.0),
        model: upstream.model.clone(),
    }
}

async fn forward_chat(
    http: &Client,
    upstream: &Upstream,
    user_message: &str,
) -> Result<ChatReply, TurnError> {
    let mut request = http.post(&upstream.url).bearer_auth(&upstream.api_key);
    if let Some(version) = &upstream.api_version {
        request = request.query(&[("api-version", version.as_str())]);
    }

    let body = post_json(request, &upstream_request(upstream, user_message)).await?;
    let (model, reply) = decode_completion(&body)?;

    Ok(ChatReply {
        model: model.or_else(|| Some(upstream.model.clone())),
        reply,
    })
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
