//! Conversation loop against a mocked Messages API, with the real built-in tools.

use std::fs;

use serde_json::json;
use trawl_engine::{RecordingTranscript, RunOptions, SessionEnd, build_agent};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    config_for, mount_claude_sequence, request_bodies, rg_binary, start_claude_mock, text_block,
    tool_use_block,
};

fn run_options(dir: &tempfile::TempDir) -> RunOptions {
    RunOptions {
        model: None,
        working_dir: Some(dir.path().to_path_buf()),
    }
}

#[tokio::test]
async fn read_file_result_is_sent_back_to_the_model() {
    let server = start_claude_mock().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello from notes\n").unwrap();

    mount_claude_sequence(
        &server,
        vec![
            json!([tool_use_block("toolu_1", "read_file", json!({"path": "notes.txt"}))]),
            json!([text_block("The note says hello.")]),
        ],
    )
    .await;

    let config = config_for(&server, dir.path());
    let mut agent = build_agent(&config, run_options(&dir)).unwrap();
    let mut transcript = RecordingTranscript::default();
    let report = agent
        .run(&b"what is in notes.txt?\n"[..], &mut transcript)
        .await;

    assert_eq!(report.end, SessionEnd::InputClosed);
    assert_eq!(report.conversation.len(), 4);
    assert_eq!(
        transcript.assistant_texts().collect::<Vec<_>>(),
        ["The note says hello."]
    );

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["model"], "claude-test");
    assert_eq!(bodies[0]["max_tokens"], 256);
    let tool_names: Vec<&str> = bodies[0]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        tool_names,
        ["list_files", "read_file", "bash", "edit_file", "grep", "tree"]
    );

    let messages = bodies[1]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(
        messages[2]["content"][0],
        json!({
            "type": "tool_result",
            "tool_use_id": "toolu_1",
            "content": "hello from notes\n",
            "is_error": false
        })
    );
}

#[tokio::test]
async fn mixed_tool_outcomes_keep_request_order() {
    let server = start_claude_mock().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.rs"), "fn main() { old(); }\n").unwrap();

    mount_claude_sequence(
        &server,
        vec![
            json!([
                tool_use_block(
                    "a",
                    "edit_file",
                    json!({"file_path": "main.rs", "old_string": "old", "new_string": "new"})
                ),
                tool_use_block("b", "teleport", json!({})),
                tool_use_block(
                    "c",
                    "edit_file",
                    json!({"file_path": "main.rs", "old_string": "missing", "new_string": "x"})
                ),
            ]),
            json!([text_block("Edited.")]),
        ],
    )
    .await;

    let config = config_for(&server, dir.path());
    let mut agent = build_agent(&config, run_options(&dir)).unwrap();
    let mut transcript = RecordingTranscript::default();
    let report = agent.run(&b"rename old\n"[..], &mut transcript).await;

    assert_eq!(report.end, SessionEnd::InputClosed);
    assert_eq!(
        fs::read_to_string(dir.path().join("main.rs")).unwrap(),
        "fn main() { new(); }\n"
    );

    let bodies = request_bodies(&server).await;
    let results = bodies[1]["messages"][2]["content"].as_array().unwrap().clone();
    let summary: Vec<(&str, &str, bool)> = results
        .iter()
        .map(|r| {
            (
                r["tool_use_id"].as_str().unwrap(),
                r["content"].as_str().unwrap(),
                r["is_error"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        [
            ("a", "OK", false),
            ("b", "Tool not found: teleport", true),
            ("c", "old_string not found in file", true),
        ]
    );
}

#[tokio::test]
async fn api_error_ends_the_session() {
    let server = start_claude_mock().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let config = config_for(&server, dir.path());
    let mut agent = build_agent(&config, run_options(&dir)).unwrap();
    let mut transcript = RecordingTranscript::default();
    let report = agent
        .run(&b"hello\nstill there?\n"[..], &mut transcript)
        .await;

    assert_eq!(
        report.end,
        SessionEnd::InferenceFailed("API error 500: internal".into())
    );
    assert_eq!(request_bodies(&server).await.len(), 1);
    assert_eq!(
        transcript.errors().collect::<Vec<_>>(),
        ["API error 500: internal"]
    );
}

#[tokio::test]
async fn grep_tool_searches_the_working_directory() {
    if rg_binary().is_none() {
        return;
    }
    let server = start_claude_mock().await;
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "// marker: TRAWL_NEEDLE\n").unwrap();

    mount_claude_sequence(
        &server,
        vec![
            json!([tool_use_block("g", "grep", json!({"pattern": "TRAWL_NEEDLE"}))]),
            json!([text_block("Found it in src/lib.rs.")]),
        ],
    )
    .await;

    let config = config_for(&server, dir.path());
    let mut agent = build_agent(&config, run_options(&dir)).unwrap();
    let mut transcript = RecordingTranscript::default();
    agent.run(&b"find the needle\n"[..], &mut transcript).await;

    let bodies = request_bodies(&server).await;
    let result = &bodies[1]["messages"][2]["content"][0];
    assert_eq!(result["is_error"], false);
    let content = result["content"].as_str().unwrap();
    assert!(content.starts_with("Found 1 matches"), "{content}");
    assert!(content.contains("  Line 1: // marker: TRAWL_NEEDLE"), "{content}");
}
