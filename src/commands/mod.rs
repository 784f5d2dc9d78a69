// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Custom command tools.
//!
//! Every tool resolves one client through the registry, finds the
//! server-advertised command for a known prefix and sends a single
//! `workspace/executeCommand` request. Tools never create or destroy
//! sessions.
//!
//! A server that does not advertise a command is reported as an error
//! [`ToolOutput`], not as an `Err`.

mod custom;
mod llm;
mod resolve;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ToolError;
use crate::lsp::LanguageClient;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

pub use custom::{CustomCommands, PipeOperation};
pub use llm::LlmTools;
pub use resolve::{resolve_client, ClientHint};

/// Known command prefixes. The server appends a unique suffix
/// (e.g. `mixClean:12345`).
pub mod prefixes {
    pub const MIX_CLEAN: &str = "mixClean:";
    pub const EXPAND_MACRO: &str = "expandMacro:";
    pub const MANIPULATE_PIPES: &str = "manipulatePipes:";
    pub const EXUNIT_TESTS_IN_FILE: &str = "getExUnitTestsInFile:";
    pub const LLM_DEFINITION: &str = "llmDefinition:";
    pub const LLM_DOCS: &str = "llmDocs:";
    pub const LLM_TYPE_INFO: &str = "llmTypeInfo:";
    pub const LLM_IMPLEMENTATION_FINDER: &str = "llmImplementationFinder:";
    pub const LLM_ENVIRONMENT: &str = "llmEnvironment:";

    pub const ALL: &[&str] = &[
        MIX_CLEAN,
        EXPAND_MACRO,
        MANIPULATE_PIPES,
        EXUNIT_TESTS_IN_FILE,
        LLM_DEFINITION,
        LLM_DOCS,
        LLM_TYPE_INFO,
        LLM_IMPLEMENTATION_FINDER,
        LLM_ENVIRONMENT,
    ];
}

/// Presentation-ready result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Output for a server that does not advertise `prefix`.
    pub fn command_not_found(client: &str, prefix: &str) -> Self {
        Self::error(format!(
            "{} does not support the {} command",
            client,
            prefix.trim_end_matches(':')
        ))
    }

    /// Map a raw command result: an `error` field becomes an error output,
    /// strings are returned as-is, anything else is pretty-printed.
    pub fn from_result(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::success("No results"),
            serde_json::Value::String(s) => Self::success(s.clone()),
            serde_json::Value::Object(map) if map.contains_key("error") => {
                let message = match &map["error"] {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::error(message)
            }
            other => Self::success(
                serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            ),
        }
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error {
            write!(f, "Error: {}", self.content)
        } else {
            write!(f, "{}", self.content)
        }
    }
}

/// First advertised command starting with `prefix`.
pub fn find_server_command(client: &dyn LanguageClient, prefix: &str) -> Option<String> {
    client
        .server_commands()
        .into_iter()
        .find(|command| command.starts_with(prefix))
}

/// Send the command for `prefix`. `Ok(None)` if the server does not
/// advertise one.
pub async fn execute_prefixed(
    client: &dyn LanguageClient,
    prefix: &str,
    arguments: Vec<serde_json::Value>,
) -> Result<Option<serde_json::Value>, ToolError> {
    let Some(command) = find_server_command(client, prefix) else {
        debug!(client = client.name(), prefix, "Command not advertised");
        return Ok(None);
    };

    let start = Instant::now();
    let result = client.execute_command(&command, arguments).await;

    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.record_command(prefix, start.elapsed(), result.is_ok());

    debug!(
        client = client.name(),
        command = %command,
        elapsed_ms = start.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Executed custom command"
    );

    Ok(Some(result?))
}
