//! Inference clients for trawl.
//!
//! The conversation loop talks to a model through the [`InferenceClient`] trait: the
//! full conversation and the declared tools go in, one assistant [`Turn`] comes out.
//! [`claude`] implements it against the Anthropic Messages API.
//!
//! # Error Handling
//!
//! Every failure is returned as an [`InferenceError`] and is never retried here. The
//! caller decides whether a failed call ends the session.

pub mod claude;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use claude::{ClaudeClient, ClaudeConfig};
pub use trawl_types;
use trawl_types::{Conversation, ToolDefinition, Turn};

/// Canonical Anthropic API origin.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Boxed future returned by [`InferenceClient::infer`].
pub type InferFut<'a> = Pin<Box<dyn Future<Output = Result<Turn, InferenceError>> + Send + 'a>>;

/// A model backend.
pub trait InferenceClient: Send + Sync {
    /// Ask the model for the next assistant turn.
    fn infer<'a>(
        &'a self,
        conversation: &'a Conversation,
        tools: &'a [ToolDefinition],
    ) -> InferFut<'a>;
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
}

pub(crate) fn client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        "X-Trawl-OS",
        HeaderValue::from_static(std::env::consts::OS),
    );
    default_headers.insert(
        "X-Trawl-Arch",
        HeaderValue::from_static(std::env::consts::ARCH),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .default_headers(default_headers)
}

/// Read an error response body, keeping at most [`MAX_ERROR_BODY_BYTES`].
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
