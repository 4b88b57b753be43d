//! The conversation loop.
//!
//! ```text
//! AwaitingUserInput ──line──▶ AwaitingModelResponse ──tool use──▶ DispatchingTools
//!        ▲                          │        ▲                          │
//!        └──────── no tool use ─────┘        └──────── results ─────────┘
//! ```
//!
//! The session ends when input closes or an inference call fails. Tool failures,
//! unknown tools and tool panics become error results and the dialogue continues.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use trawl_providers::InferenceClient;
use trawl_tools::{ToolCtx, ToolRegistry};
use trawl_types::{
    ContentBlock, Conversation, NonEmptyString, ToolCall, ToolDefinition, ToolResult, Turn,
};

use crate::transcript::Transcript;

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    InputClosed,
    /// Reading user input failed.
    InputFailed(String),
    InferenceFailed(String),
}

#[derive(Debug)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub conversation: Conversation,
}

pub struct Agent<C> {
    client: C,
    registry: ToolRegistry,
    ctx: ToolCtx,
    definitions: Vec<ToolDefinition>,
}

impl<C: InferenceClient> Agent<C> {
    /// The registry is fixed for the lifetime of the agent.
    pub fn new(client: C, registry: ToolRegistry, ctx: ToolCtx) -> Self {
        let definitions = registry.definitions();
        Self {
            client,
            registry,
            ctx,
            definitions,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Drive the dialogue until `input` closes or inference fails.
    pub async fn run<R>(&mut self, mut input: R, transcript: &mut dyn Transcript) -> SessionReport
    where
        R: AsyncBufRead + Unpin,
    {
        let mut conversation = Conversation::new();
        let mut buf = Vec::new();

        tracing::debug!(tools = ?self.registry, "Starting conversation");
        transcript.banner();

        let end = loop {
            transcript.prompt();
            let line = match read_line_lossy(&mut input, &mut buf).await {
                Ok(Some(line)) => line,
                Ok(None) => break SessionEnd::InputClosed,
                Err(e) => {
                    let message = e.to_string();
                    transcript.error(&message);
                    break SessionEnd::InputFailed(message);
                }
            };

            // Whitespace-only lines count as empty; the API rejects blank text blocks.
            let Ok(text) = NonEmptyString::new(line) else {
                tracing::debug!("Skipping empty user input");
                continue;
            };
            conversation.push(Turn::user_text(text));

            if let Err(message) = self.complete_turn(&mut conversation, transcript).await {
                transcript.error(&message);
                break SessionEnd::InferenceFailed(message);
            }
        };

        tracing::debug!(turns = conversation.len(), end = ?end, "Conversation ended");
        SessionReport { end, conversation }
    }

    /// Infer, dispatch tools, and repeat until the assistant stops asking for tools.
    async fn complete_turn(
        &mut self,
        conversation: &mut Conversation,
        transcript: &mut dyn Transcript,
    ) -> Result<(), String> {
        loop {
            tracing::debug!(turns = conversation.len(), "Sending message to Claude");
            let reply = self
                .client
                .infer(conversation, &self.definitions)
                .await
                .map_err(|e| {
                    tracing::warn!("Inference failed: {e}");
                    e.to_string()
                })?;
            tracing::debug!(blocks = reply.content.len(), "Received response");

            let has_tool_calls = reply.has_tool_calls();
            conversation.push(reply);
            let Some(reply) = conversation.last() else {
                return Ok(());
            };

            let mut results = Vec::new();
            for block in &reply.content {
                match block {
                    ContentBlock::Text { text } => transcript.assistant_text(text),
                    ContentBlock::ToolUse(call) => {
                        transcript.tool_use(&call.name, &call.input);
                        results.push(self.dispatch(call).await);
                    }
                    ContentBlock::ToolResult(_) => {}
                }
            }

            if !has_tool_calls {
                transcript.turn_complete();
                return Ok(());
            }

            tracing::debug!(count = results.len(), "Sending tool results");
            conversation.push(Turn::tool_results(results));
        }
    }

    async fn dispatch(&mut self, call: &ToolCall) -> ToolResult {
        let executor = match self.registry.lookup(&call.name) {
            Ok(executor) => executor,
            Err(e) => {
                tracing::warn!(tool = %call.name, "Unknown tool requested");
                return ToolResult::error(&call.id, e.to_string());
            }
        };

        tracing::debug!(tool = %call.name, id = %call.id, "Executing tool");
        let exec = executor.execute(call.input.clone(), &mut self.ctx);
        match AssertUnwindSafe(exec).catch_unwind().await {
            Ok(Ok(output)) => ToolResult::success(&call.id, output),
            Ok(Err(e)) => {
                tracing::debug!(tool = %call.name, "Tool failed: {e}");
                ToolResult::error(&call.id, e.to_string())
            }
            Err(panic_payload) => {
                let panic_msg = panic_payload_to_string(&panic_payload);
                tracing::warn!(tool = %call.name, "Tool panicked: {panic_msg}");
                ToolResult::error(&call.id, format!("Tool panicked: {panic_msg}"))
            }
        }
    }
}

/// Read one line, replacing invalid UTF-8. `None` at end of input.
async fn read_line_lossy<R>(input: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if input.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = buf.strip_suffix(b"\n").unwrap_or(buf.as_slice());
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok(Some(String::from_utf8_lossy(line).into_owned()))
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
