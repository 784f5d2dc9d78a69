// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client registry: routing table and session lifecycle.
//!
//! Routes every document to exactly one language client session, starts
//! sessions lazily on the first relevant document open and tears them down
//! when their folder leaves the workspace.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::DEFAULT_DISPOSE_TIMEOUT_MS;
use crate::error::RegistryError;
use crate::lsp::{
    is_activation_language, DocumentSelector, LanguageClient, TextDocument, ELIXIR_LANGUAGE_ID,
};
use crate::workspace::{WorkspaceFolder, WorkspaceMode, WorkspaceTracker};

use super::factory::{ClientFactory, SessionSpec};
use super::notifier::{ChangeNotifier, Subscription};
use super::session::{ClientSession, Lifecycle, RoutingKey};

// ============================================================================
// Registry Options
// ============================================================================

/// Configuration options for the client registry.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Upper bound on stopping one client during teardown.
    pub dispose_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            dispose_timeout: Duration::from_millis(DEFAULT_DISPOSE_TIMEOUT_MS),
        }
    }
}

// ============================================================================
// Routing Table
// ============================================================================

#[derive(Default)]
struct RoutingTable {
    default: Option<Arc<ClientSession>>,
    /// Keyed by outermost folder URI.
    clients: BTreeMap<String, Arc<ClientSession>>,
}

impl RoutingTable {
    fn get(&self, key: &RoutingKey) -> Option<&Arc<ClientSession>> {
        match key {
            RoutingKey::Default => self.default.as_ref(),
            RoutingKey::Folder(uri) => self.clients.get(uri),
        }
    }

    fn sessions(&self) -> Vec<Arc<ClientSession>> {
        self.default
            .iter()
            .chain(self.clients.values())
            .cloned()
            .collect()
    }
}

// ============================================================================
// Client Registry
// ============================================================================

/// Owns every client session and routes URIs and documents to them.
///
/// At most one session exists per outermost folder, plus at most one
/// default session while no folder is open. The routing table is only
/// mutated by this type; its lock is never held across an `.await`.
pub struct ClientRegistry {
    tracker: Arc<WorkspaceTracker>,
    factory: Arc<dyn ClientFactory>,
    table: Mutex<RoutingTable>,
    notifier: ChangeNotifier,
    options: RegistryOptions,
}

impl ClientRegistry {
    pub fn new(tracker: Arc<WorkspaceTracker>, factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_options(tracker, factory, RegistryOptions::default())
    }

    pub fn with_options(
        tracker: Arc<WorkspaceTracker>,
        factory: Arc<dyn ClientFactory>,
        options: RegistryOptions,
    ) -> Self {
        Self {
            tracker,
            factory,
            table: Mutex::new(RoutingTable::default()),
            notifier: ChangeNotifier::new(),
            options,
        }
    }

    pub fn tracker(&self) -> &Arc<WorkspaceTracker> {
        &self.tracker
    }

    fn table(&self) -> MutexGuard<'_, RoutingTable> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Listen for routing table changes.
    pub fn on_did_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    // ------------------------------------------------------------------------
    // Session creation
    // ------------------------------------------------------------------------

    /// Make sure a session serves `document`, starting one if needed.
    ///
    /// Returns `true` when a session was created. Documents of other
    /// languages are ignored.
    #[instrument(skip(self, document), fields(uri = %document.uri, language = %document.language_id))]
    pub fn handle_document_opened(&self, document: &TextDocument) -> Result<bool, RegistryError> {
        if !is_activation_language(&document.language_id) {
            return Ok(false);
        }

        let workspace = self.tracker.workspace();
        let folder = workspace
            .folder_for_uri(&document.uri)
            .or_else(|| workspace.first_folder());

        let created = match folder {
            None => self.ensure_default_session()?,
            Some(folder) => {
                let outermost = self.tracker.outermost_folder(&folder)?;
                self.ensure_folder_session(outermost)?
            }
        };

        if created {
            self.notifier.notify();
        }
        Ok(created)
    }

    fn ensure_default_session(&self) -> Result<bool, RegistryError> {
        let spec = SessionSpec {
            key: RoutingKey::Default,
            folder: None,
            selector: DocumentSelector::all_documents(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            settings: self.tracker.workspace().default_settings(),
        };

        let session = {
            let mut table = self.table();
            if table.default.is_some() {
                return Ok(false);
            }
            let session = self.create_session(spec)?;
            table.default = Some(Arc::clone(&session));
            session
        };

        self.start_session(&session);
        Ok(true)
    }

    fn ensure_folder_session(&self, outermost: WorkspaceFolder) -> Result<bool, RegistryError> {
        let key = outermost.key();
        if self.has_client_for_key(&key) {
            return Ok(false);
        }

        let spec = self.folder_session_spec(outermost)?;
        let session = {
            let mut table = self.table();
            if table.clients.contains_key(&key) {
                return Ok(false);
            }
            let session = self.create_session(spec)?;
            table.clients.insert(key, Arc::clone(&session));
            session
        };

        self.start_session(&session);
        Ok(true)
    }

    fn folder_session_spec(&self, folder: WorkspaceFolder) -> Result<SessionSpec, RegistryError> {
        let workspace = self.tracker.workspace();
        let cwd = folder.path()?;
        let selector = match self.tracker.mode() {
            WorkspaceMode::MultiRoot => DocumentSelector::for_folder(&cwd, folder.index == 0),
            _ => DocumentSelector::all_documents(),
        };
        Ok(SessionSpec {
            key: RoutingKey::Folder(folder.key()),
            settings: workspace.settings_for(&folder),
            folder: Some(folder),
            selector,
            cwd,
        })
    }

    fn create_session(&self, spec: SessionSpec) -> Result<Arc<ClientSession>, RegistryError> {
        let client = self.factory.create(&spec).map_err(|e| {
            error!(session = %spec.key, error = %e, "Failed to create language client");
            RegistryError::StartupFailed {
                key: spec.key.to_string(),
                message: e.to_string(),
            }
        })?;
        info!(session = %spec.key, client = client.name(), "Registering language client");
        Ok(ClientSession::new(spec.key, client, spec.selector, spec.folder))
    }

    fn start_session(&self, session: &Arc<ClientSession>) {
        session.forward_notifications();
        session.run_lifecycle(Lifecycle::Start, |client| async move { client.start().await });
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    /// Routing key serving `uri`: its folder (or the first folder when it
    /// lies outside all of them) resolved to the outermost folder, or the
    /// default key when no folder is open.
    pub fn routing_key_for_uri(&self, uri: &Url) -> Result<RoutingKey, RegistryError> {
        let workspace = self.tracker.workspace();
        match workspace
            .folder_for_uri(uri)
            .or_else(|| workspace.first_folder())
        {
            Some(folder) => Ok(RoutingKey::Folder(
                self.tracker.outermost_folder(&folder)?.key(),
            )),
            None => Ok(RoutingKey::Default),
        }
    }

    /// Session serving `uri`, settled or not. Callers await
    /// [`ClientSession::wait_until_ready`] before sending requests.
    pub fn client_promise_by_uri(&self, uri: &Url) -> Result<Arc<ClientSession>, RegistryError> {
        let key = self.routing_key_for_uri(uri)?;
        self.table().get(&key).cloned().ok_or_else(|| {
            error!(%uri, session = %key, "No language client registered for URI");
            RegistryError::ClientNotFound {
                key: key.to_string(),
            }
        })
    }

    /// Client serving `uri`.
    pub fn client_by_uri(&self, uri: &Url) -> Result<Arc<dyn LanguageClient>, RegistryError> {
        self.client_promise_by_uri(uri).map(|session| session.client())
    }

    /// Like [`Self::client_promise_by_uri`], but only `elixir` documents are
    /// routed; template languages yield `Ok(None)`.
    pub fn client_promise_by_document(
        &self,
        document: &TextDocument,
    ) -> Result<Option<Arc<ClientSession>>, RegistryError> {
        if document.language_id != ELIXIR_LANGUAGE_ID {
            return Ok(None);
        }
        self.client_promise_by_uri(&document.uri).map(Some)
    }

    pub fn client_by_document(
        &self,
        document: &TextDocument,
    ) -> Result<Option<Arc<dyn LanguageClient>>, RegistryError> {
        Ok(self
            .client_promise_by_document(document)?
            .map(|session| session.client()))
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn default_session(&self) -> Option<Arc<ClientSession>> {
        self.table().default.clone()
    }

    pub fn default_client(&self) -> Option<Arc<dyn LanguageClient>> {
        self.default_session().map(|s| s.client())
    }

    /// Every session, default first, then folder sessions by key.
    pub fn all_sessions(&self) -> Vec<Arc<ClientSession>> {
        self.table().sessions()
    }

    pub fn all_clients(&self) -> Vec<Arc<dyn LanguageClient>> {
        self.all_sessions().iter().map(|s| s.client()).collect()
    }

    /// Number of folder sessions (the default session is not counted).
    pub fn clients_len(&self) -> usize {
        self.table().clients.len()
    }

    /// Whether a folder session is registered under `key` (with or without
    /// a trailing `/`).
    pub fn has_client_for_key(&self, key: &str) -> bool {
        let key = key.strip_suffix('/').unwrap_or(key);
        self.table().clients.contains_key(key)
    }

    /// Routing keys of every session, default first.
    pub fn keys(&self) -> Vec<RoutingKey> {
        self.all_sessions().iter().map(|s| s.key().clone()).collect()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Restart every session through its client's own restart. Each
    /// session keeps its key and client handle; failures leave it
    /// registered as failed.
    #[instrument(skip(self))]
    pub async fn restart(&self) -> Vec<(RoutingKey, Result<(), RegistryError>)> {
        let sessions = self.all_sessions();
        info!(sessions = sessions.len(), "Restarting language clients");

        let scheduled: Vec<Arc<ClientSession>> = sessions
            .into_iter()
            .filter(|session| {
                session.run_lifecycle(Lifecycle::Restart, |client| async move {
                    client.restart().await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(scheduled.len());
        for session in scheduled {
            let result = session.wait_until_ready().await.map(|_| ());
            if let Err(e) = &result {
                warn!(session = %session.key(), error = %e, "Language client restart failed");
            }
            results.push((session.key().clone(), result));
        }
        results
    }

    /// Tear down the session registered under exactly this folder's key.
    ///
    /// The routing change is visible (and announced) before teardown
    /// starts. Returns `false` if the folder owned no session.
    #[instrument(skip(self, folder), fields(folder = %folder.name))]
    pub async fn handle_workspace_folder_removed(&self, folder: &WorkspaceFolder) -> bool {
        let removed = {
            let mut table = self.table();
            let removed = table.clients.remove(&folder.key());
            if let Some(session) = &removed {
                session.dispose_subscriptions();
            }
            removed
        };

        let Some(session) = removed else {
            debug!("Removed folder owned no language client");
            return false;
        };

        self.notifier.notify();
        session.shutdown(self.options.dispose_timeout).await;
        true
    }

    /// Apply a folder change event: update the workspace, invalidate the
    /// tracker, then tear down sessions of removed folders.
    ///
    /// Returns the folders that were added.
    #[instrument(skip(self, added, removed), fields(added = added.len(), removed = removed.len()))]
    pub async fn handle_workspace_folders_changed(
        &self,
        added: &[Url],
        removed: &[Url],
    ) -> Vec<WorkspaceFolder> {
        let workspace = self.tracker.workspace();

        let added_folders: Vec<WorkspaceFolder> = added
            .iter()
            .map(|uri| match uri.to_file_path() {
                Ok(path) => workspace
                    .add_folder_path(&path)
                    .unwrap_or_else(|_| workspace.add_folder(uri.clone(), uri.as_str())),
                Err(_) => workspace.add_folder(uri.clone(), uri.as_str()),
            })
            .collect();
        let removed_folders: Vec<WorkspaceFolder> = removed
            .iter()
            .filter_map(|uri| workspace.remove_folder(uri))
            .collect();

        self.tracker.handle_did_change_workspace_folders();

        for folder in &removed_folders {
            self.handle_workspace_folder_removed(folder).await;
        }
        added_folders
    }

    /// Tear down every session. Routing is cleared and announced once
    /// before the sessions are stopped in parallel.
    #[instrument(skip(self))]
    pub async fn deactivate(&self) {
        let sessions = {
            let mut table = self.table();
            let sessions = table.sessions();
            for session in &sessions {
                session.dispose_subscriptions();
            }
            table.default = None;
            table.clients.clear();
            sessions
        };

        if sessions.is_empty() {
            return;
        }
        info!(sessions = sessions.len(), "Deactivating language clients");
        self.notifier.notify();

        let timeout = self.options.dispose_timeout;
        let mut teardown = JoinSet::new();
        for session in sessions {
            teardown.spawn(async move { session.shutdown(timeout).await });
        }
        while let Some(result) = teardown.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Teardown task failed");
            }
        }
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("sessions", &self.keys())
            .finish()
    }
}
