// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language server connections.
//!
//! This module owns everything that talks to an ElixirLS process: launcher
//! script resolution, the JSON-RPC client, and the document/selector types
//! shared with the registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ClientRegistry                          │
//! │     (routing key -> session, owns every client handle)       │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ Arc<dyn LanguageClient>
//!          ┌─────────────────┼─────────────────┐
//!          ▼                 ▼                 ▼
//! ┌─────────────────┐ ┌─────────────┐ ┌─────────────────┐
//! │ ElixirLsClient  │ │  Launcher   │ │ DocumentSelector│
//! │ (stdio JSON-RPC │ │ (per-kind   │ │ (which documents│
//! │  per process)   │ │  scripts)   │ │  a client owns) │
//! └─────────────────┘ └─────────────┘ └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use elixir_ls_client::config::FolderSettings;
//! use elixir_ls_client::lsp::{ClientOptions, ElixirLsClient, LanguageClient, LaunchKind, Launcher};
//!
//! let launcher = Launcher::new("/opt/elixir-ls");
//! let spec = launcher.resolve(LaunchKind::LanguageServer, &FolderSettings::default());
//! let client = ElixirLsClient::new(ClientOptions::new("ElixirLS", spec));
//! client.start().await?;
//!
//! for command in client.server_commands() {
//!     println!("{}", command);
//! }
//! client.stop().await?;
//! ```

mod client;
mod error;
pub mod launcher;
pub mod types;

pub use client::{did_close_params, did_open_params, ClientOptions, ElixirLsClient, LanguageClient};
pub use error::{error_codes, LspError, LspResult};
pub use launcher::{LaunchKind, LaunchSpec, Launcher};
pub use types::{
    is_activation_language, language_id_for_extension, DocumentFilter, DocumentSelector, Position,
    ServerNotification, ServerState, TextDocument, ACTIVATION_LANGUAGE_IDS, ELIXIR_LANGUAGE_ID,
};
