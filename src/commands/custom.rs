// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Editor commands backed by ElixirLS custom commands.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use url::Url;

use crate::error::ToolError;
use crate::lsp::Position;
use crate::registry::ClientRegistry;

use super::{execute_prefixed, prefixes, resolve_client, ClientHint, ToolOutput};

/// Sections of an `expandMacro` result, in display order.
const EXPANSION_SECTIONS: &[&str] = &["expandOnce", "expand", "expandPartial", "expandAll", "ast"];

/// Direction of a pipe conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipeOperation {
    #[serde(rename = "toPipe")]
    ToPipe,
    #[serde(rename = "fromPipe")]
    FromPipe,
}

impl PipeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToPipe => "toPipe",
            Self::FromPipe => "fromPipe",
        }
    }
}

impl std::str::FromStr for PipeOperation {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toPipe" | "to-pipe" => Ok(Self::ToPipe),
            "fromPipe" | "from-pipe" => Ok(Self::FromPipe),
            other => Err(ToolError::InvalidInput(format!("unknown pipe operation: {}", other))),
        }
    }
}

/// Macro expansion, pipe manipulation, `mix clean` and restart.
#[derive(Clone)]
pub struct CustomCommands {
    registry: Arc<ClientRegistry>,
}

impl CustomCommands {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Expand the macros in `text`, selected in `uri` starting at `line`.
    #[instrument(skip_all, fields(%uri, line))]
    pub async fn expand_macro(&self, uri: &Url, text: &str, line: u32) -> Result<ToolOutput, ToolError> {
        if text.trim().is_empty() {
            return Ok(ToolOutput::error("Select the code to expand"));
        }

        let client = resolve_client(&self.registry, &ClientHint::file(uri.clone())).await?;
        let arguments = vec![
            serde_json::json!(uri.to_string()),
            serde_json::json!(text),
            serde_json::json!(line),
        ];
        match execute_prefixed(client.as_ref(), prefixes::EXPAND_MACRO, arguments).await? {
            Some(result) => Ok(format_expansion(&result)),
            None => Ok(ToolOutput::command_not_found(client.name(), prefixes::EXPAND_MACRO)),
        }
    }

    /// Convert the call at `position` into a pipe or out of one.
    #[instrument(skip_all, fields(%uri, op = operation.as_str()))]
    pub async fn manipulate_pipes(
        &self,
        operation: PipeOperation,
        uri: &Url,
        position: Position,
    ) -> Result<ToolOutput, ToolError> {
        let client = resolve_client(&self.registry, &ClientHint::file(uri.clone())).await?;
        let arguments = vec![
            serde_json::json!(operation.as_str()),
            serde_json::json!(uri.to_string()),
            serde_json::json!(position.line),
            serde_json::json!(position.character),
        ];
        match execute_prefixed(client.as_ref(), prefixes::MANIPULATE_PIPES, arguments).await? {
            Some(result) if result.get("error").is_some() => Ok(ToolOutput::from_result(&result)),
            Some(_) => Ok(ToolOutput::success(format!(
                "Applied {} at {}",
                operation.as_str(),
                position
            ))),
            None => Ok(ToolOutput::command_not_found(client.name(), prefixes::MANIPULATE_PIPES)),
        }
    }

    /// Run `mix clean` (optionally `--deps`) in every running client.
    #[instrument(skip(self))]
    pub async fn mix_clean(&self, clean_deps: bool) -> Result<ToolOutput, ToolError> {
        let sessions = self.registry.all_sessions();
        if sessions.is_empty() {
            return Err(ToolError::NoClient("no ElixirLS client is running".to_string()));
        }

        let mut report = String::new();
        let mut failures = 0;
        for session in sessions {
            let client = match session.wait_until_ready().await {
                Ok(client) => client,
                Err(e) => {
                    failures += 1;
                    let _ = writeln!(report, "{}: {}", session.key(), e);
                    continue;
                }
            };
            let line = match execute_prefixed(client.as_ref(), prefixes::MIX_CLEAN, vec![serde_json::json!(clean_deps)]).await {
                Ok(Some(_)) => format!("{}: cleaned", client.name()),
                Ok(None) => {
                    failures += 1;
                    ToolOutput::command_not_found(client.name(), prefixes::MIX_CLEAN).content
                }
                Err(e) => {
                    failures += 1;
                    warn!(client = client.name(), error = %e, "mix clean failed");
                    format!("{}: {}", client.name(), e)
                }
            };
            let _ = writeln!(report, "{}", line);
        }

        let report = report.trim_end().to_string();
        Ok(if failures > 0 {
            ToolOutput::error(report)
        } else {
            ToolOutput::success(report)
        })
    }

    /// Restart every client.
    pub async fn restart_all(&self) -> ToolOutput {
        let results = self.registry.restart().await;
        if results.is_empty() {
            return ToolOutput::success("No ElixirLS client is running");
        }

        let mut report = String::new();
        let mut failed = false;
        for (key, result) in &results {
            match result {
                Ok(()) => {
                    let _ = writeln!(report, "{}: restarted", key);
                }
                Err(e) => {
                    failed = true;
                    let _ = writeln!(report, "{}: {}", key, e);
                }
            }
        }

        let report = report.trim_end().to_string();
        if failed {
            ToolOutput::error(report)
        } else {
            ToolOutput::success(report)
        }
    }
}

/// Render an `expandMacro` result as one Elixir block per expansion.
fn format_expansion(result: &serde_json::Value) -> ToolOutput {
    let Some(map) = result.as_object() else {
        return ToolOutput::from_result(result);
    };
    if map.contains_key("error") {
        return ToolOutput::from_result(result);
    }

    let mut keys: Vec<&str> = EXPANSION_SECTIONS
        .iter()
        .copied()
        .filter(|k| map.contains_key(*k))
        .collect();
    keys.extend(
        map.keys()
            .map(String::as_str)
            .filter(|k| !EXPANSION_SECTIONS.contains(k)),
    );

    let mut out = String::new();
    for key in keys {
        let Some(code) = map.get(key).and_then(|v| v.as_str()) else {
            continue;
        };
        if code.trim().is_empty() {
            continue;
        }
        let _ = write!(out, "# {}\n\n```elixir\n{}\n```\n\n", key, code.trim_end());
    }

    if out.is_empty() {
        ToolOutput::success("No expansion available")
    } else {
        ToolOutput::success(out.trim_end().to_string())
    }
}
