//! Enumerate-then-search against a fixture, checked against a plain ripgrep run.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use trawl_search::{FilesOptions, Provisioner, Ripgrep, SearchOptions};

use crate::common::rg_binary;

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join(".git/refs")).unwrap();
    fs::create_dir_all(root.join("src/net")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join(".git/config"), "fetch = TODO_ITEM\n").unwrap();
    fs::write(
        root.join("src/main.rs"),
        "fn main() {\n    // TODO_ITEM: parse flags\n    run();\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/net/client.rs"),
        "pub struct Client;\n// TODO_ITEM retry\n// TODO_ITEM backoff with ünïcode\n",
    )
    .unwrap();
    fs::write(root.join("docs/guide.md"), "# Guide\nNothing pending.\n").unwrap();
    fs::write(root.join(".env"), "SECRET=1 # TODO_ITEM\n").unwrap();
    dir
}

/// `path:line:text` triples from a direct ripgrep invocation.
fn reference_matches(binary: &Path, root: &Path, pattern: &str) -> Vec<(String, u64, String)> {
    let output = Command::new(binary)
        .args([
            "--no-heading",
            "--with-filename",
            "--line-number",
            "--color=never",
            "--hidden",
            "--glob=!.git/*",
            "--",
            pattern,
        ])
        .current_dir(root)
        .stdin(Stdio::null())
        .output()
        .unwrap();

    let mut matches: Vec<(String, u64, String)> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| {
            let mut parts = line.splitn(3, ':');
            let path = parts.next().unwrap().to_string();
            let number = parts.next().unwrap().parse().unwrap();
            let text = parts.next().unwrap().to_string();
            (path, number, text)
        })
        .collect();
    matches.sort();
    matches
}

#[tokio::test]
async fn enumeration_skips_git_metadata() {
    let Some(binary) = rg_binary() else { return };
    let dir = fixture();
    let rg = Ripgrep::new(Provisioner::preresolved(binary));

    let mut files = rg
        .files(&FilesOptions::new(dir.path()))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    files.sort();

    assert!(files.iter().all(|f| !f.starts_with(".git/")), "{files:?}");
    assert_eq!(
        files,
        [".env", "docs/guide.md", "src/main.rs", "src/net/client.rs"]
    );
}

#[tokio::test]
async fn json_search_matches_reference_run() {
    let Some(binary) = rg_binary() else { return };
    let dir = fixture();
    let rg = Ripgrep::new(Provisioner::preresolved(&binary));

    let mut found: Vec<(String, u64, String)> = rg
        .search(&SearchOptions::new(dir.path(), "TODO_ITEM"))
        .await
        .unwrap()
        .into_iter()
        .map(|m| (m.path().to_string(), m.line_number, m.line_text().to_string()))
        .collect();
    found.sort();

    let expected = reference_matches(&binary, dir.path(), "TODO_ITEM");
    assert_eq!(expected.len(), 4);
    assert_eq!(found, expected);
}

#[tokio::test]
async fn files_from_enumeration_contain_every_match() {
    let Some(binary) = rg_binary() else { return };
    let dir = fixture();
    let rg = Ripgrep::new(Provisioner::preresolved(binary));

    let files = rg
        .files(&FilesOptions::new(dir.path()))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    let matches = rg
        .search(&SearchOptions::new(dir.path(), "TODO_ITEM"))
        .await
        .unwrap();

    for m in &matches {
        assert!(files.iter().any(|f| f == m.path()), "{} not listed", m.path());
    }
}

#[tokio::test]
async fn search_without_matches_is_empty() {
    let Some(binary) = rg_binary() else { return };
    let dir = fixture();
    let rg = Ripgrep::new(Provisioner::preresolved(binary));

    let matches = rg
        .search(&SearchOptions::new(dir.path(), "NO_SUCH_TOKEN_ANYWHERE"))
        .await
        .unwrap();
    assert!(matches.is_empty());
}
