use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use trawl_types::{ContentBlock, Conversation, ToolCall, ToolDefinition, Turn};

use crate::{
    ANTHROPIC_BASE_URL, InferFut, InferenceClient, InferenceError, client_builder,
    read_capped_error_body,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// API origin; `/v1/messages` is appended.
    pub base_url: String,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Content kinds the loop understands. Anything else (thinking, citations, ...) is
/// dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

impl ResponseBlock {
    fn into_content(self) -> Option<ContentBlock> {
        match self {
            Self::Text { text } => Some(ContentBlock::Text { text }),
            Self::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolUse(ToolCall::new(id, name, input)))
            }
            Self::Unsupported => None,
        }
    }
}

/// Anthropic Messages API client (non-streaming).
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    config: ClaudeConfig,
    http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self, InferenceError> {
        let http = client_builder().build()?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    async fn send(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<Turn, InferenceError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: conversation,
            tools: (!tools.is_empty()).then_some(tools),
        };

        debug!(
            model = %self.config.model,
            turns = conversation.len(),
            tools = tools.len(),
            "Sending inference request"
        );
        let response = self
            .http
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        debug!(
            blocks = parsed.content.len(),
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("none"),
            "Received inference response"
        );
        let content = parsed
            .content
            .into_iter()
            .filter_map(ResponseBlock::into_content)
            .collect();
        Ok(Turn::assistant(content))
    }
}

impl InferenceClient for ClaudeClient {
    fn infer<'a>(
        &'a self,
        conversation: &'a Conversation,
        tools: &'a [ToolDefinition],
    ) -> InferFut<'a> {
        Box::pin(self.send(conversation, tools))
    }
}
