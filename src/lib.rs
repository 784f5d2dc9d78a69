// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ElixirLS client - workspace-aware language server routing.
//!
//! An editor session may open several workspace folders, some nested inside
//! others (umbrella apps, monorepos). This crate decides which folder owns a
//! language server, starts one ElixirLS process per owning folder on demand,
//! routes every document and tool request to the right process, and tears
//! processes down when folders close.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`workspace`] - Workspace folders and outermost-folder classification
//! - [`registry`] - Client sessions, routing table and lifecycle
//! - [`lsp`] - Language client trait, the stdio ElixirLS client and launcher
//! - [`commands`] - Tools backed by ElixirLS custom commands
//! - [`testing`] - ExUnit test discovery and `mix test` runs
//! - [`terminal_links`] - Source locations in terminal output
//! - [`config`] - Folder settings and client configuration
//! - [`telemetry`] - Tracing and metrics
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use elixir_ls_client::config::{load_config, CliOptions};
//! use elixir_ls_client::lsp::TextDocument;
//! use elixir_ls_client::registry::{ClientRegistry, ProcessClientFactory};
//! use elixir_ls_client::workspace::{Workspace, WorkspaceTracker};
//!
//! let config = load_config(CliOptions::default())?;
//! let workspace = Arc::new(Workspace::with_defaults(config.folder_defaults.clone()));
//! workspace.add_folder_path(&project)?;
//!
//! let tracker = Arc::new(WorkspaceTracker::new(workspace));
//! let registry = ClientRegistry::new(tracker, Arc::new(ProcessClientFactory::new(config)));
//!
//! let doc = TextDocument::from_path(&project.join("lib/app.ex")).unwrap();
//! registry.handle_document_opened(&doc)?;
//! let client = registry.client_promise_by_uri(&doc.uri)?.wait_until_ready().await?;
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod lsp;
pub mod registry;
pub mod telemetry;
pub mod terminal_links;
pub mod testing;
pub mod workspace;

// Re-export commonly used types at crate root
pub use error::{ConfigError, RegistryError, Result, ToolError, WorkspaceError};
pub use lsp::{LanguageClient, LspError, TextDocument};
pub use registry::{ClientRegistry, ClientSession, RoutingKey, SessionState};
pub use workspace::{Workspace, WorkspaceFolder, WorkspaceMode, WorkspaceTracker};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let workspace = Workspace::new();
        assert!(workspace.is_empty());
        assert_eq!(RoutingKey::Default.to_string(), "default");
    }
}
