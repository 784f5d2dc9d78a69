// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Construction of language clients for new sessions.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{FolderSettings, ResolvedConfig};
use crate::lsp::{ClientOptions, DocumentSelector, ElixirLsClient, LanguageClient, LaunchKind, Launcher, LspResult};
use crate::workspace::WorkspaceFolder;

use super::session::RoutingKey;

/// Everything needed to build the client of a new session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub key: RoutingKey,
    /// Outermost folder, `None` for the default session.
    pub folder: Option<WorkspaceFolder>,
    pub selector: DocumentSelector,
    /// Working directory of the server process.
    pub cwd: PathBuf,
    pub settings: FolderSettings,
}

impl SessionSpec {
    /// Display name of the client.
    pub fn client_name(&self) -> String {
        match &self.folder {
            Some(folder) => format!("ElixirLS - {}", folder.name),
            None => "ElixirLS".to_string(),
        }
    }
}

/// Builds client handles for the registry.
///
/// Called while the routing table is locked, so implementations must not
/// block; the client is started later by the registry.
pub trait ClientFactory: Send + Sync {
    fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>>;
}

/// Factory spawning ElixirLS processes from a release directory.
#[derive(Debug, Clone)]
pub struct ProcessClientFactory {
    launcher: Launcher,
    config: ResolvedConfig,
}

impl ProcessClientFactory {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            launcher: Launcher::new(config.release_dir.clone()),
            config,
        }
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Client options for a session.
    pub fn options_for(&self, spec: &SessionSpec) -> ClientOptions {
        let launch = self
            .launcher
            .resolve(LaunchKind::LanguageServer, &spec.settings)
            .with_cwd(&spec.cwd);

        let mut options = ClientOptions::new(spec.client_name(), launch);
        options.root = spec
            .folder
            .as_ref()
            .map(|f| (f.uri.clone(), f.name.clone()));
        options.selector = spec.selector.clone();
        options.settings = spec.settings.clone();
        options.startup_timeout_ms = self.config.startup_timeout_ms;
        options.request_timeout_ms = self.config.request_timeout_ms;
        options
    }
}

impl ClientFactory for ProcessClientFactory {
    fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>> {
        Ok(Arc::new(ElixirLsClient::new(self.options_for(spec))))
    }
}
