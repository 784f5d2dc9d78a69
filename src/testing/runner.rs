// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `mix test` invocation for test tree nodes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::error::ToolError;

use super::tree::{NodeId, NodeKind, TestTree};

/// A resolved `mix test` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub project_dir: PathBuf,
    /// Arguments after the program, starting with `test`.
    pub args: Vec<String>,
}

impl TestRun {
    /// Command line for a node, or `None` for an unknown id.
    pub fn for_node(tree: &TestTree, id: NodeId) -> Option<Self> {
        let node = tree.node(id)?;
        let meta = tree.meta(id)?;
        let file = meta
            .file
            .as_deref()
            .map(|f| relative_to(f, &meta.project_dir));

        let mut args = vec!["test".to_string()];
        match (node.kind, file) {
            (NodeKind::Workspace, _) | (_, None) => {}
            (NodeKind::File | NodeKind::Module, Some(file)) => args.push(file),
            (NodeKind::Describe, Some(file)) => {
                let describe = meta.describe.as_deref().unwrap_or(&node.label);
                args.push("--only".to_string());
                args.push(format!("describe:{}", describe));
                args.push(file);
            }
            (NodeKind::Test | NodeKind::Doctest, Some(file)) => match meta.line {
                Some(line) => args.push(format!("{}:{}", file, line)),
                None => args.push(file),
            },
        }

        Some(Self {
            project_dir: meta.project_dir.clone(),
            args,
        })
    }
}

fn relative_to(file: &Path, base: &Path) -> String {
    file.strip_prefix(base)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, one line per entry.
    pub output: Vec<String>,
}

/// Runs `mix test` commands.
#[derive(Debug, Clone)]
pub struct TestRunner {
    program: String,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    pub fn new() -> Self {
        Self::with_program("mix")
    }

    /// Use another executable in place of `mix`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `run` in its project directory, passing each output line to
    /// `sink` as it arrives.
    #[instrument(skip(self, sink), fields(dir = %run.project_dir.display()))]
    pub async fn run(
        &self,
        run: &TestRun,
        mut sink: impl FnMut(&str) + Send,
    ) -> Result<TestOutcome, ToolError> {
        let start = Instant::now();
        info!(program = %self.program, args = ?run.args, "Running tests");

        let mut child = Command::new(&self.program)
            .args(&run.args)
            .current_dir(&run.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn {}: {}", self.program, e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut output = Vec::new();
        while let Some(line) = rx.recv().await {
            sink(&line);
            output.push(line);
        }

        let status = child.wait().await?;
        debug!(
            exit_code = ?status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Test run finished"
        );

        Ok(TestOutcome {
            success: status.success(),
            exit_code: status.code(),
            output,
        })
    }
}

async fn forward_lines(stream: impl AsyncRead + Unpin, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}
