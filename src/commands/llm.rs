// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Code intelligence tools for LLM agents.

use std::path::Path;
use std::sync::Arc;

use tracing::instrument;
use url::Url;

use crate::error::ToolError;
use crate::registry::ClientRegistry;

use super::{execute_prefixed, prefixes, resolve_client, ClientHint, ToolOutput};

/// Definition, documentation, type and environment lookups.
#[derive(Clone)]
pub struct LlmTools {
    registry: Arc<ClientRegistry>,
}

impl LlmTools {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    async fn run(
        &self,
        hint: &ClientHint,
        prefix: &str,
        arguments: Vec<serde_json::Value>,
    ) -> Result<ToolOutput, ToolError> {
        let client = resolve_client(&self.registry, hint).await?;
        match execute_prefixed(client.as_ref(), prefix, arguments).await? {
            Some(result) => Ok(ToolOutput::from_result(&result)),
            None => Ok(ToolOutput::command_not_found(client.name(), prefix)),
        }
    }

    /// Source of the definition of a module, function or type
    /// (e.g. `Enum.map/2`).
    #[instrument(skip(self, hint))]
    pub async fn definition(&self, hint: &ClientHint, symbol: &str) -> Result<ToolOutput, ToolError> {
        let symbol = non_empty(symbol, "symbol")?;
        self.run(hint, prefixes::LLM_DEFINITION, vec![serde_json::json!(symbol)])
            .await
    }

    /// Documentation of one or more modules or functions.
    #[instrument(skip(self, hint))]
    pub async fn docs(&self, hint: &ClientHint, modules: &[String]) -> Result<ToolOutput, ToolError> {
        if modules.iter().all(|m| m.trim().is_empty()) {
            return Err(ToolError::InvalidInput("at least one module is required".to_string()));
        }
        self.run(hint, prefixes::LLM_DOCS, vec![serde_json::json!(modules)])
            .await
    }

    /// Types, specs and callbacks of the module in `file_path`.
    #[instrument(skip(self))]
    pub async fn type_info(&self, file_path: &Path) -> Result<ToolOutput, ToolError> {
        let uri = Url::from_file_path(file_path).map_err(|_| {
            ToolError::InvalidInput(format!("not an absolute path: {}", file_path.display()))
        })?;
        let hint = ClientHint::file(uri);
        self.run(
            &hint,
            prefixes::LLM_TYPE_INFO,
            vec![serde_json::json!(file_path.to_string_lossy())],
        )
        .await
    }

    /// Implementations of a behaviour, protocol or callback.
    #[instrument(skip(self, hint))]
    pub async fn implementations(&self, hint: &ClientHint, symbol: &str) -> Result<ToolOutput, ToolError> {
        let symbol = non_empty(symbol, "symbol")?;
        self.run(hint, prefixes::LLM_IMPLEMENTATION_FINDER, vec![serde_json::json!(symbol)])
            .await
    }

    /// Compilation environment (aliases, imports, variables) at a
    /// `path:line:column` location.
    #[instrument(skip(self))]
    pub async fn environment(&self, location: &str) -> Result<ToolOutput, ToolError> {
        let location = non_empty(location, "location")?;
        let hint = match location_file(location) {
            Some(uri) => ClientHint::file(uri),
            None => ClientHint::none(),
        };
        self.run(&hint, prefixes::LLM_ENVIRONMENT, vec![serde_json::json!(location)])
            .await
    }
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ToolError::InvalidInput(format!("{} must not be empty", field)))
    } else {
        Ok(trimmed)
    }
}

/// File URI of a `path[:line[:column]]` location.
fn location_file(location: &str) -> Option<Url> {
    let mut path = location;
    for _ in 0..2 {
        match path.rsplit_once(':') {
            Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
                path = head;
            }
            _ => break,
        }
    }
    Url::from_file_path(path).ok()
}
