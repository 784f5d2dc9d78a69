// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client resolution for tools.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::error::ToolError;
use crate::lsp::{LanguageClient, TextDocument};
use crate::registry::{ClientRegistry, ClientSession};

/// Context a tool invocation can use to pick a client.
#[derive(Debug, Clone, Default)]
pub struct ClientHint {
    /// File the tool was asked about.
    pub file: Option<Url>,
    /// Document focused in the host editor.
    pub active_document: Option<TextDocument>,
}

impl ClientHint {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn file(uri: Url) -> Self {
        Self {
            file: Some(uri),
            active_document: None,
        }
    }

    pub fn with_active_document(mut self, document: TextDocument) -> Self {
        self.active_document = Some(document);
        self
    }
}

fn session_for_hint(registry: &ClientRegistry, hint: &ClientHint) -> Option<Arc<ClientSession>> {
    if let Some(uri) = &hint.file {
        match registry.client_promise_by_uri(uri) {
            Ok(session) => return Some(session),
            Err(e) => debug!(%uri, error = %e, "File hint did not resolve a client"),
        }
    }

    if let Some(document) = &hint.active_document {
        match registry.client_promise_by_document(document) {
            Ok(Some(session)) => return Some(session),
            Ok(None) => {}
            Err(e) => debug!(uri = %document.uri, error = %e, "Active document did not resolve a client"),
        }
    }

    registry
        .default_session()
        .or_else(|| registry.all_sessions().into_iter().next())
}

/// Resolve a ready client: file hint, then active document, then the
/// default client, then the first registered client.
pub async fn resolve_client(
    registry: &ClientRegistry,
    hint: &ClientHint,
) -> Result<Arc<dyn LanguageClient>, ToolError> {
    let session = session_for_hint(registry, hint).ok_or_else(|| {
        ToolError::NoClient("no ElixirLS client is running".to_string())
    })?;
    Ok(session.wait_until_ready().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::ScriptedClient;
    use crate::lsp::LspResult;
    use crate::registry::{ClientFactory, SessionSpec};
    use crate::workspace::{Workspace, WorkspaceTracker};
    use tempfile::TempDir;

    struct NamedFactory;

    impl ClientFactory for NamedFactory {
        fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>> {
            Ok(ScriptedClient::named(spec.client_name(), &[], serde_json::Value::Null))
        }
    }

    fn setup(folders: &[&str]) -> (TempDir, ClientRegistry) {
        let temp = TempDir::new().unwrap();
        let workspace = Arc::new(Workspace::new());
        for folder in folders {
            let path = temp.path().join(folder);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("mix.exs"), "").unwrap();
            workspace.add_folder_path(&path).unwrap();
        }
        let tracker = Arc::new(WorkspaceTracker::new(workspace));
        let registry = ClientRegistry::new(tracker, Arc::new(NamedFactory));
        (temp, registry)
    }

    fn open(temp: &TempDir, registry: &ClientRegistry, rel: &str) -> TextDocument {
        let doc = TextDocument::from_path(&temp.path().join(rel)).unwrap();
        registry.handle_document_opened(&doc).unwrap();
        doc
    }

    #[tokio::test]
    async fn test_no_client_is_an_error() {
        let (_temp, registry) = setup(&[]);
        let err = resolve_client(&registry, &ClientHint::none()).await.err().unwrap();
        assert!(matches!(err, ToolError::NoClient(_)));
    }

    #[tokio::test]
    async fn test_file_hint_wins() {
        let (temp, registry) = setup(&["a", "b"]);
        open(&temp, &registry, "a/mix.exs");
        let b = open(&temp, &registry, "b/mix.exs");

        let hint = ClientHint::file(b.uri.clone());
        let client = resolve_client(&registry, &hint).await.unwrap();
        assert_eq!(client.name(), "ElixirLS - b");
    }

    #[tokio::test]
    async fn test_active_document_used_without_file_hint() {
        let (temp, registry) = setup(&["a", "b"]);
        open(&temp, &registry, "a/mix.exs");
        let b = open(&temp, &registry, "b/mix.exs");

        let hint = ClientHint::none().with_active_document(b);
        let client = resolve_client(&registry, &hint).await.unwrap();
        assert_eq!(client.name(), "ElixirLS - b");
    }

    #[tokio::test]
    async fn test_unresolvable_hint_falls_back_to_first_client() {
        let (temp, registry) = setup(&["a", "b"]);
        open(&temp, &registry, "a/mix.exs");

        // b has no session yet.
        let hint = ClientHint::file(Url::from_file_path(temp.path().join("b/mix.exs")).unwrap());
        let client = resolve_client(&registry, &hint).await.unwrap();
        assert_eq!(client.name(), "ElixirLS - a");
    }

    #[tokio::test]
    async fn test_default_client_used_without_folders() {
        let (temp, registry) = setup(&[]);
        std::fs::write(temp.path().join("script.exs"), "").unwrap();
        open(&temp, &registry, "script.exs");

        let client = resolve_client(&registry, &ClientHint::none()).await.unwrap();
        assert_eq!(client.name(), "ElixirLS");
    }
}
