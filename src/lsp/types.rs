// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LSP types shared by the client, the registry and the tool layer.
//!
//! These types mirror the LSP protocol types but are reduced to what the
//! routing layer and the custom command tools actually need.

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use url::Url;

/// Language id of the primary serviced language.
pub const ELIXIR_LANGUAGE_ID: &str = "elixir";

/// Language ids whose documents activate a language client.
///
/// Template languages only need diagnostics forwarding; full routing is
/// reserved for [`ELIXIR_LANGUAGE_ID`].
pub const ACTIVATION_LANGUAGE_IDS: &[&str] = &["elixir", "eex", "html-eex", "phoenix-heex"];

/// Check whether a language id activates a language client.
pub fn is_activation_language(language_id: &str) -> bool {
    ACTIVATION_LANGUAGE_IDS.contains(&language_id)
}

/// Position in a text document (0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    /// Line number (0-indexed).
    pub line: u32,
    /// Character offset (0-indexed, UTF-16 code units).
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// A text document as reported by the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    /// Document URI (`file:` or `untitled:`).
    pub uri: Url,
    /// Language identifier (e.g., "elixir", "eex").
    pub language_id: String,
    /// Document version.
    pub version: i32,
}

impl TextDocument {
    /// Create a new document at version 1.
    pub fn new(uri: Url, language_id: impl Into<String>) -> Self {
        Self {
            uri,
            language_id: language_id.into(),
            version: 1,
        }
    }

    /// Create a document for a file path, inferring the language id.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let uri = Url::from_file_path(path).ok()?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Some(Self::new(uri, language_id_for_extension(ext)))
    }

    /// Whether the document lives in an unsaved buffer.
    pub fn is_untitled(&self) -> bool {
        self.uri.scheme() == "untitled"
    }
}

/// Language ID for a file extension (as expected by ElixirLS).
pub fn language_id_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "ex" | "exs" => "elixir",
        "eex" | "leex" => "eex",
        "heex" => "phoenix-heex",
        "erl" | "hrl" => "erlang",
        "md" | "markdown" => "markdown",
        "json" => "json",
        _ => "plaintext",
    }
}

/// A single document filter of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Language id the filter applies to.
    pub language: String,
    /// URI scheme (`file` or `untitled`).
    pub scheme: String,
    /// Optional glob on the document's file system path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl DocumentFilter {
    /// Create a filter for a language and scheme.
    pub fn new(language: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            scheme: scheme.into(),
            pattern: None,
        }
    }

    /// Restrict the filter to paths matching a glob.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    fn matcher(&self) -> Option<GlobMatcher> {
        let pattern = self.pattern.as_ref()?;
        Glob::new(pattern).ok().map(|g| g.compile_matcher())
    }

    /// Check whether a document is selected by this filter.
    pub fn matches(&self, document: &TextDocument) -> bool {
        if document.language_id != self.language || document.uri.scheme() != self.scheme {
            return false;
        }
        match &self.pattern {
            None => true,
            Some(_) => {
                let Some(matcher) = self.matcher() else {
                    return false;
                };
                document
                    .uri
                    .to_file_path()
                    .map(|path| matcher.is_match(path))
                    .unwrap_or(false)
            }
        }
    }
}

/// A set of document filters; a document is selected if any filter matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSelector(pub Vec<DocumentFilter>);

impl DocumentSelector {
    /// Selector used for folder-less sessions and single-folder workspaces:
    /// every activation language on both `file` and `untitled` schemes.
    pub fn all_documents() -> Self {
        let filters = ACTIVATION_LANGUAGE_IDS
            .iter()
            .flat_map(|lang| {
                [
                    DocumentFilter::new(*lang, "file"),
                    DocumentFilter::new(*lang, "untitled"),
                ]
            })
            .collect();
        Self(filters)
    }

    /// Selector used in multi-root workspaces, scoped to one folder.
    ///
    /// Unsaved documents have no folder; they go to the session of the first
    /// workspace folder only.
    pub fn for_folder(folder_path: &std::path::Path, include_untitled: bool) -> Self {
        let pattern = format!("{}/**/*", escape_glob(&folder_path.to_string_lossy()));
        let mut filters: Vec<DocumentFilter> = ACTIVATION_LANGUAGE_IDS
            .iter()
            .map(|lang| DocumentFilter::new(*lang, "file").with_pattern(pattern.clone()))
            .collect();
        if include_untitled {
            filters.extend(
                ACTIVATION_LANGUAGE_IDS
                    .iter()
                    .map(|lang| DocumentFilter::new(*lang, "untitled")),
            );
        }
        Self(filters)
    }

    /// Check whether a document is selected.
    pub fn matches(&self, document: &TextDocument) -> bool {
        self.0.iter().any(|f| f.matches(document))
    }
}

/// Escape glob metacharacters so a literal path can prefix a pattern.
fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '*' | '?' | '[' | ']' | '{' | '}' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Server connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// Server process has not been spawned yet.
    Stopped,
    /// Server is starting up.
    Starting,
    /// Server is ready for requests.
    Ready,
    /// Server process exited or the connection broke.
    Error,
    /// Server has shut down.
    Shutdown,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Error => write!(f, "error"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A notification pushed by the language server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerNotification {
    /// JSON-RPC method name.
    pub method: String,
    /// Raw parameters.
    pub params: serde_json::Value,
}

impl ServerNotification {
    /// Extract the message text of `window/logMessage` / `window/showMessage`.
    pub fn message_text(&self) -> Option<&str> {
        match self.method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                self.params.get("message").and_then(|m| m.as_str())
            }
            _ => None,
        }
    }

    /// LSP message type (1 = error, 2 = warning, 3 = info, 4 = log).
    pub fn message_type(&self) -> Option<i64> {
        self.params.get("type").and_then(|t| t.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn doc(uri: &str, lang: &str) -> TextDocument {
        TextDocument::new(Url::parse(uri).unwrap(), lang)
    }

    #[test]
    fn test_activation_languages() {
        assert!(is_activation_language("elixir"));
        assert!(is_activation_language("phoenix-heex"));
        assert!(!is_activation_language("erlang"));
        assert!(!is_activation_language("plaintext"));
    }

    #[test]
    fn test_language_id_for_extension() {
        assert_eq!(language_id_for_extension("ex"), "elixir");
        assert_eq!(language_id_for_extension("EXS"), "elixir");
        assert_eq!(language_id_for_extension("heex"), "phoenix-heex");
        assert_eq!(language_id_for_extension("eex"), "eex");
        assert_eq!(language_id_for_extension("unknown"), "plaintext");
    }

    #[test]
    fn test_all_documents_selector() {
        let selector = DocumentSelector::all_documents();
        assert!(selector.matches(&doc("file:///any/where/lib/a.ex", "elixir")));
        assert!(selector.matches(&doc("untitled:sample.exs", "elixir")));
        assert!(!selector.matches(&doc("file:///any/where/a.erl", "erlang")));
        assert_eq!(selector.0.len(), ACTIVATION_LANGUAGE_IDS.len() * 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_selector_scopes_to_folder() {
        let selector = DocumentSelector::for_folder(Path::new("/work/umbrella"), false);
        assert!(selector.matches(&doc("file:///work/umbrella/lib/a.ex", "elixir")));
        assert!(selector.matches(&doc("file:///work/umbrella/apps/child/lib/b.ex", "elixir")));
        assert!(!selector.matches(&doc("file:///work/other/lib/a.ex", "elixir")));
        assert!(!selector.matches(&doc("untitled:sample.exs", "elixir")));
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_selector_untitled_for_first_folder() {
        let selector = DocumentSelector::for_folder(Path::new("/work/umbrella"), true);
        assert!(selector.matches(&doc("untitled:sample.exs", "elixir")));
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_selector_escapes_metacharacters() {
        let selector = DocumentSelector::for_folder(Path::new("/work/[odd]"), false);
        assert!(selector.matches(&doc("file:///work/%5Bodd%5D/lib/a.ex", "elixir")));
        assert!(!selector.matches(&doc("file:///work/o/lib/a.ex", "elixir")));
    }

    #[test]
    fn test_document_is_untitled() {
        assert!(doc("untitled:sample.exs", "elixir").is_untitled());
        assert!(!doc("file:///a.ex", "elixir").is_untitled());
    }

    #[test]
    fn test_notification_message_text() {
        let notification = ServerNotification {
            method: "window/logMessage".to_string(),
            params: serde_json::json!({"type": 3, "message": "Compiling"}),
        };
        assert_eq!(notification.message_text(), Some("Compiling"));
        assert_eq!(notification.message_type(), Some(3));

        let other = ServerNotification {
            method: "textDocument/publishDiagnostics".to_string(),
            params: serde_json::json!({}),
        };
        assert!(other.message_text().is_none());
    }

    #[test]
    fn test_server_state_display() {
        assert_eq!(ServerState::Ready.to_string(), "ready");
        assert_eq!(ServerState::default(), ServerState::Stopped);
    }
}
