//! Tools backed by ripgrep: `list_files`, `grep` and `tree`.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::json;
use trawl_search::{FilesOptions, LineSearchOptions};

use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

#[derive(Debug, Default)]
pub struct ListFilesTool;

#[derive(Debug, Default)]
pub struct GrepTool;

#[derive(Debug, Default)]
pub struct TreeTool;

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct GrepArgs {
    #[serde(default)]
    pattern: String,
    path: Option<String>,
    include: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeArgs {
    path: Option<String>,
    limit: Option<usize>,
}

fn search_root(ctx: &ToolCtx, path: Option<&str>) -> PathBuf {
    match path.filter(|p| !p.is_empty()) {
        Some(path) => ctx.resolve_path(path),
        None => ctx.working_dir.clone(),
    }
}

impl ToolExecutor for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List all files under a directory, recursively. Paths are relative to that directory; \
         version-control metadata is skipped."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the directory to list" }
            },
            "required": ["path"]
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ListFilesArgs = parse_args(&args)?;
            let root = search_root(ctx, Some(&typed.path));
            let mut paths = ctx
                .ripgrep
                .files(&FilesOptions::new(root))
                .await?
                .collect()
                .await?;
            paths.sort();
            Ok(paths.join("\n"))
        })
    }
}

impl ToolExecutor for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents with a regular expression. Returns matching lines grouped by \
         file, most recently modified files first, capped at 100 matches. Use 'include' to \
         restrict the files searched (e.g. \"*.rs\", \"*.{ts,tsx}\")."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "The regex pattern to search for in file contents" },
                "path": { "type": "string", "description": "The directory to search in. Defaults to the working directory." },
                "include": { "type": "string", "description": "File pattern to include in the search (e.g. \"*.js\", \"*.{ts,tsx}\")" }
            },
            "required": ["pattern"]
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: GrepArgs = parse_args(&args)?;
            if typed.pattern.is_empty() {
                return Err(ToolError::Required("pattern"));
            }

            let mut options =
                LineSearchOptions::new(typed.pattern, search_root(ctx, typed.path.as_deref()));
            if let Some(include) = typed.include.filter(|glob| !glob.is_empty()) {
                options = options.include(include);
            }
            let outcome = ctx.ripgrep.line_search(&options).await?;
            Ok(outcome.render())
        })
    }
}

impl ToolExecutor for TreeTool {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn description(&self) -> &'static str {
        "Show the directory structure as an indented tree. Large trees are cut down \
         breadth-first to at most 'limit' entries; '[N truncated]' marks omitted children."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to show. Defaults to the working directory." },
                "limit": { "type": "integer", "minimum": 1, "description": "Maximum number of entries to show (default 50)" }
            },
            "required": []
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TreeArgs = parse_args(&args)?;
            let root = search_root(ctx, typed.path.as_deref());
            let limit = typed.limit.unwrap_or(ctx.tree_limit);
            Ok(ctx.ripgrep.tree(&root, limit).await?)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use serde_json::json;
    use trawl_search::{Provisioner, Ripgrep};

    use super::{GrepTool, ListFilesTool, TreeTool};
    use crate::{ToolCtx, ToolExecutor};

    fn rg_ctx(dir: &tempfile::TempDir) -> Option<ToolCtx> {
        let Ok(binary) = which::which("rg") else {
            eprintln!("rg not on PATH; skipping");
            return None;
        };
        Some(ToolCtx::new(
            dir.path(),
            Arc::new(Ripgrep::new(Provisioner::preresolved(binary))),
        ))
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: needle\n").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn needle() {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "no match here\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn grep_requires_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolCtx::new(
            dir.path(),
            Arc::new(Ripgrep::new(Provisioner::preresolved("rg"))),
        );
        let err = GrepTool
            .execute(json!({"pattern": ""}), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "pattern is required");
    }

    #[tokio::test]
    async fn list_files_skips_git() {
        let dir = fixture();
        let Some(mut ctx) = rg_ctx(&dir) else { return };

        let out = ListFilesTool
            .execute(json!({"path": "."}), &mut ctx)
            .await
            .unwrap();
        let paths: Vec<&str> = out.lines().collect();
        assert_eq!(paths.len(), 2, "{out}");
        assert!(paths.iter().all(|p| !p.contains(".git")));
        assert!(paths.iter().any(|p| p.ends_with("lib.rs")));
    }

    #[tokio::test]
    async fn list_files_on_missing_directory_is_an_error() {
        let dir = fixture();
        let Some(mut ctx) = rg_ctx(&dir) else { return };

        let err = ListFilesTool
            .execute(json!({"path": "nope"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("No such file or directory"));
    }

    #[tokio::test]
    async fn grep_renders_grouped_matches() {
        let dir = fixture();
        let Some(mut ctx) = rg_ctx(&dir) else { return };

        let out = GrepTool
            .execute(json!({"pattern": "needle", "include": "*.rs"}), &mut ctx)
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Found 1 matches");
        assert!(lines[1].ends_with("lib.rs:"), "{out}");
        assert_eq!(lines[2], "  Line 1: pub fn needle() {}");
    }

    #[tokio::test]
    async fn grep_without_matches_says_so() {
        let dir = fixture();
        let Some(mut ctx) = rg_ctx(&dir) else { return };

        let out = GrepTool
            .execute(json!({"pattern": "zzz_absent"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "No matches found.");
    }

    #[tokio::test]
    async fn tree_honours_limit_argument() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let Some(mut ctx) = rg_ctx(&dir) else { return };

        let out = TreeTool
            .execute(json!({"limit": 3}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "f0.txt\nf1.txt\nf2.txt\n[2 truncated]");
    }
}
