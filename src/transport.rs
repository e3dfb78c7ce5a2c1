use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::events::ChatMode;

/// Wire token the backend interprets as "forget the conversation"
const CLEAR_HISTORY_TOKEN: &str = "/clear";
/// Wire token the backend interprets as "flip native/langchain"
const TOGGLE_MODE_TOKEN: &str = "/mode";

/// A request to the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    /// Free text typed by the user
    UserText(String),
    ClearHistory,
    ToggleMode,
}

impl ChatRequest {
    /// Value of the `message` field sent to the backend.
    pub fn wire_message(&self) -> &str {
        match self {
            ChatRequest::UserText(text) => text,
            ChatRequest::ClearHistory => CLEAR_HISTORY_TOKEN,
            ChatRequest::ToggleMode => TOGGLE_MODE_TOKEN,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    message: &'a str,
}

/// Body returned by the chat endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<ChatMode>,
}

/// What a successful round trip means for the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The backend answered with an explicit error payload
    Rejected(String),
    Answered {
        text: String,
        mode: Option<ChatMode>,
    },
}

impl ChatResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Interpret the payload. A non-empty `error` wins over `message`.
    pub fn into_reply(self) -> Reply {
        match self.error {
            Some(error) if !error.is_empty() => Reply::Rejected(error),
            _ => Reply::Answered {
                text: self.message.unwrap_or_default(),
                mode: self.mode,
            },
        }
    }
}

fn lenient_mode<'de, D>(deserializer: D) -> Result<Option<ChatMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse::<ChatMode>() {
        Ok(mode) => Some(mode),
        Err(_) => {
            tracing::warn!(mode = %value, "ignoring unknown chat mode from backend");
            None
        }
    }))
}

/// Failure of the round trip itself, as opposed to an error payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response (HTTP {status}): {reason}")]
    InvalidResponse { status: u16, reason: String },
}

/// Sends one request to the chat backend and waits for its answer
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, TransportError>;
}

/// JSON-over-HTTP sender for the `/api/chat` endpoint
#[derive(Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSender {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl MessageSender for HttpSender {
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, TransportError> {
        tracing::debug!(endpoint = %self.endpoint, ?request, "sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&WireRequest {
                message: request.wire_message(),
            })
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        // The backend reports validation and model failures as JSON bodies on
        // 400/500, so the status alone does not decide success.
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        serde_json::from_slice::<ChatResponse>(&body).map_err(|e| {
            tracing::warn!(status = status.as_u16(), error = %e, "undecodable chat response");
            TransportError::InvalidResponse {
                status: status.as_u16(),
                reason: e.to_string(),
            }
        })
    }
}
