//! Shared test utilities and fixtures
//!
//! A wiremock stand-in for the Anthropic Messages API and config helpers that
//! point trawl at it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use trawl_engine::TrawlConfig;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock server that simulates the Claude API
pub async fn start_claude_mock() -> MockServer {
    MockServer::start().await
}

/// A Messages API response body carrying `content` blocks.
pub fn claude_message(content: Value) -> Value {
    let stop_reason = if content
        .as_array()
        .is_some_and(|blocks| blocks.iter().any(|b| b["type"] == "tool_use"))
    {
        "tool_use"
    } else {
        "end_turn"
    };
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "model": "claude-test",
        "content": content,
        "stop_reason": stop_reason,
        "usage": { "input_tokens": 10, "output_tokens": 20 }
    })
}

pub fn text_block(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

pub fn tool_use_block(id: &str, name: &str, input: Value) -> Value {
    json!({ "type": "tool_use", "id": id, "name": name, "input": input })
}

/// Mount one response per request, served in order.
pub async fn mount_claude_sequence(server: &MockServer, replies: Vec<Value>) {
    for reply in replies {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(claude_message(reply)))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

/// JSON bodies of every request the mock received, oldest first.
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

/// Write a config file aimed at `server` and load it the way the binary does.
pub fn config_for(server: &MockServer, dir: &Path) -> TrawlConfig {
    let path = dir.join("config.toml");
    let body = format!(
        "[app]\nmodel = \"claude-test\"\nmax_tokens = 256\n\n\
         [api_keys]\nanthropic = \"sk-test\"\n\n\
         [anthropic]\nbase_url = \"{}\"\n\n\
         [search]\ncache_dir = \"{}\"\n",
        server.uri(),
        dir.join("bin").display()
    );
    std::fs::write(&path, body).unwrap();
    TrawlConfig::read(&path).unwrap()
}

/// The ripgrep on `PATH`, if any. Callers skip when this is `None`.
pub fn rg_binary() -> Option<PathBuf> {
    match which::which("rg") {
        Ok(binary) => Some(binary),
        Err(_) => {
            eprintln!("rg not on PATH; skipping");
            None
        }
    }
}
