// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! LSP client implementation.
//!
//! This module defines the [`LanguageClient`] seam used by the registry and
//! the tool layer, and [`ElixirLsClient`], which talks to an ElixirLS process
//! using JSON-RPC over stdio.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use crate::config::{FolderSettings, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STARTUP_TIMEOUT_MS};

use super::error::{error_codes, LspError, LspResult};
use super::launcher::LaunchSpec;
use super::types::{language_id_for_extension, DocumentSelector, ServerNotification, ServerState, TextDocument};

/// Capacity of the server notification broadcast channel.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// How long `stop` waits for the process to exit after `exit` before killing it.
const EXIT_GRACE_PERIOD: Duration = Duration::from_millis(500);

type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

/// A connection to one language server process.
///
/// Implementations own their process; only the registry starts, restarts and
/// stops them.
#[async_trait]
pub trait LanguageClient: Send + Sync {
    /// Human-readable client name (used in logs).
    fn name(&self) -> &str;

    /// Current connection state.
    fn state(&self) -> ServerState;

    /// Spawn the server and complete the initialize handshake.
    async fn start(&self) -> LspResult<()>;

    /// Shut the server down and release the process.
    async fn stop(&self) -> LspResult<()>;

    /// Stop and start again, keeping the same client handle.
    async fn restart(&self) -> LspResult<()> {
        self.stop().await?;
        self.start().await
    }

    /// Commands advertised in `executeCommandProvider.commands`.
    fn server_commands(&self) -> Vec<String>;

    /// Send a request and wait for its result.
    async fn request(&self, method: &str, params: serde_json::Value) -> LspResult<serde_json::Value>;

    /// Send a notification.
    async fn notify(&self, method: &str, params: serde_json::Value) -> LspResult<()>;

    /// Send `workspace/executeCommand` with positional arguments.
    async fn execute_command(
        &self,
        command: &str,
        arguments: Vec<serde_json::Value>,
    ) -> LspResult<serde_json::Value> {
        self.request(
            "workspace/executeCommand",
            serde_json::json!({ "command": command, "arguments": arguments }),
        )
        .await
    }

    /// Subscribe to notifications pushed by the server.
    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification>;
}

/// Options for an [`ElixirLsClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Client name (e.g. "ElixirLS - umbrella").
    pub name: String,
    /// How to spawn the server.
    pub launch: LaunchSpec,
    /// Workspace folder the server is scoped to, if any.
    pub root: Option<(Url, String)>,
    /// Documents this client is responsible for.
    pub selector: DocumentSelector,
    /// Settings sent through `workspace/didChangeConfiguration`.
    pub settings: FolderSettings,
    pub startup_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl ClientOptions {
    /// Create options with default timeouts.
    pub fn new(name: impl Into<String>, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            launch,
            root: None,
            selector: DocumentSelector::all_documents(),
            settings: FolderSettings::default(),
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// An LSP client for a single ElixirLS process.
pub struct ElixirLsClient {
    options: ClientOptions,
    process: Mutex<Option<Child>>,
    state: Arc<RwLock<ServerState>>,
    request_id: AtomicU64,
    pending_requests: PendingRequests,
    /// Outgoing message channel (framed by the writer task).
    tx: Mutex<Option<mpsc::Sender<String>>>,
    commands: RwLock<Vec<String>>,
    notifications: broadcast::Sender<ServerNotification>,
    /// Id of the current server connection; bumped on every spawn and kill.
    connection: Arc<AtomicU64>,
}

impl ElixirLsClient {
    /// Create a new client. The process is spawned by [`LanguageClient::start`].
    pub fn new(options: ClientOptions) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            options,
            process: Mutex::new(None),
            state: Arc::new(RwLock::new(ServerState::Stopped)),
            request_id: AtomicU64::new(1),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            tx: Mutex::new(None),
            commands: RwLock::new(Vec::new()),
            notifications,
            connection: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn set_state(&self, state: ServerState) {
        set_state(&self.state, state);
    }

    async fn spawn_process(&self) -> LspResult<()> {
        let launch = &self.options.launch;

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &launch.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &launch.env {
            cmd.env(key, value);
        }

        let mut process = cmd.spawn().map_err(|e| {
            LspError::StartupFailed(format!(
                "Failed to spawn {}: {}",
                launch.program.display(),
                e
            ))
        })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| LspError::StartupFailed("Failed to get stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| LspError::StartupFailed("Failed to get stdout".to_string()))?;

        if let Some(stderr) = process.stderr.take() {
            let name = self.options.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(client = %name, "{}", line);
                }
            });
        }

        *self.process.lock().await = Some(process);

        let (tx, mut rx) = mpsc::channel::<String>(100);
        *self.tx.lock().await = Some(tx.clone());

        let mut writer = stdin;
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let header = format!("Content-Length: {}\r\n\r\n", msg.len());
                if writer.write_all(header.as_bytes()).await.is_err() {
                    break;
                }
                if writer.write_all(msg.as_bytes()).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let connection_id = self.connection.fetch_add(1, Ordering::SeqCst) + 1;
        let reader = MessageReader {
            pending: Arc::clone(&self.pending_requests),
            notifications: self.notifications.clone(),
            state: Arc::clone(&self.state),
            responder: tx,
            settings: self.options.settings.to_server_settings(),
            connection: Arc::clone(&self.connection),
            connection_id,
        };
        tokio::spawn(reader.run(BufReader::new(stdout)));

        Ok(())
    }

    async fn initialize(&self) -> LspResult<()> {
        let (root_uri, workspace_folders) = match &self.options.root {
            Some((uri, name)) => (
                serde_json::Value::String(uri.to_string()),
                serde_json::json!([{ "uri": uri.to_string(), "name": name }]),
            ),
            None => (serde_json::Value::Null, serde_json::Value::Null),
        };

        let params = serde_json::json!({
            "processId": std::process::id(),
            "clientInfo": { "name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") },
            "rootUri": root_uri,
            "workspaceFolders": workspace_folders,
            "capabilities": {
                "workspace": {
                    "configuration": true,
                    "workspaceFolders": true,
                    "didChangeConfiguration": { "dynamicRegistration": true },
                    "executeCommand": { "dynamicRegistration": false }
                },
                "textDocument": {
                    "synchronization": {
                        "dynamicRegistration": false,
                        "didSave": true
                    },
                    "publishDiagnostics": { "relatedInformation": true }
                },
                "window": { "workDoneProgress": true }
            }
        });

        let response = self.request_raw("initialize", params).await?;

        let commands: Vec<String> = response
            .pointer("/capabilities/executeCommandProvider/commands")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        debug!(client = %self.options.name, commands = commands.len(), "Server commands advertised");
        if let Ok(mut guard) = self.commands.write() {
            *guard = commands;
        }

        self.notify("initialized", serde_json::json!({})).await?;
        self.notify(
            "workspace/didChangeConfiguration",
            serde_json::json!({ "settings": self.options.settings.to_server_settings() }),
        )
        .await?;

        self.set_state(ServerState::Ready);
        Ok(())
    }

    /// Send a request regardless of the ready state.
    async fn request_raw(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> LspResult<serde_json::Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let (tx, rx) = oneshot::channel();
        self.pending_requests.lock().await.insert(id, tx);

        let msg = serde_json::to_string(&request)?;
        if let Some(ref sender) = *self.tx.lock().await {
            sender.send(msg).await.map_err(|_| {
                LspError::CommunicationError("Failed to send request".to_string())
            })?;
        } else {
            self.pending_requests.lock().await.remove(&id);
            return Err(LspError::NotReady("Server not started".to_string()));
        }

        let timeout = Duration::from_millis(self.options.request_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1) as i32;
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error");
                    return Err(LspError::server_error(code, message));
                }
                Ok(response
                    .get("result")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null))
            }
            Ok(Err(_)) => Err(LspError::CommunicationError("Channel closed".to_string())),
            Err(_) => {
                self.pending_requests.lock().await.remove(&id);
                Err(LspError::Timeout(self.options.request_timeout_ms))
            }
        }
    }

    async fn kill_process(&self) {
        self.connection.fetch_add(1, Ordering::SeqCst);
        if let Some(mut process) = self.process.lock().await.take() {
            match tokio::time::timeout(EXIT_GRACE_PERIOD, process.wait()).await {
                Ok(Ok(status)) => debug!(client = %self.options.name, %status, "Server exited"),
                _ => {
                    let _ = process.kill().await;
                }
            }
        }
        *self.tx.lock().await = None;
        // Dropping the senders fails every in-flight request.
        self.pending_requests.lock().await.clear();
    }
}

#[async_trait]
impl LanguageClient for ElixirLsClient {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn state(&self) -> ServerState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(ServerState::Error)
    }

    #[instrument(skip(self), fields(client = %self.options.name))]
    async fn start(&self) -> LspResult<()> {
        self.set_state(ServerState::Starting);
        info!(program = %self.options.launch.program.display(), "Starting language server");

        if let Err(e) = self.spawn_process().await {
            self.set_state(ServerState::Error);
            return Err(e);
        }

        let timeout = Duration::from_millis(self.options.startup_timeout_ms);
        let result = match tokio::time::timeout(timeout, self.initialize()).await {
            Ok(result) => result,
            Err(_) => Err(LspError::StartupFailed(format!(
                "initialize did not complete within {}ms",
                self.options.startup_timeout_ms
            ))),
        };

        if let Err(e) = result {
            self.kill_process().await;
            self.set_state(ServerState::Error);
            return Err(e);
        }

        Ok(())
    }

    #[instrument(skip(self), fields(client = %self.options.name))]
    async fn stop(&self) -> LspResult<()> {
        if self.state() == ServerState::Ready {
            if let Err(e) = self.request_raw("shutdown", serde_json::Value::Null).await {
                debug!(error = %e, "Shutdown request failed");
            }
            let _ = self.notify("exit", serde_json::Value::Null).await;
        }

        self.kill_process().await;
        self.set_state(ServerState::Shutdown);
        Ok(())
    }

    fn server_commands(&self) -> Vec<String> {
        self.commands.read().map(|c| c.clone()).unwrap_or_default()
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> LspResult<serde_json::Value> {
        let state = self.state();
        if state != ServerState::Ready {
            return Err(LspError::NotReady(format!("{} is {}", self.options.name, state)));
        }
        self.request_raw(method, params).await
    }

    async fn notify(&self, method: &str, params: serde_json::Value) -> LspResult<()> {
        if let Some(document) = synced_document(method, &params) {
            if !self.options.selector.matches(&document) {
                debug!(
                    client = %self.options.name,
                    uri = %document.uri,
                    method,
                    "Document not selected by this client, not syncing"
                );
                return Ok(());
            }
        }

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });

        let msg = serde_json::to_string(&notification)?;
        if let Some(ref sender) = *self.tx.lock().await {
            sender.send(msg).await.map_err(|_| {
                LspError::CommunicationError("Failed to send notification".to_string())
            })?;
        }

        Ok(())
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
        self.notifications.subscribe()
    }
}

fn set_state(state: &RwLock<ServerState>, value: ServerState) {
    if let Ok(mut guard) = state.write() {
        *guard = value;
    }
}

/// Reads framed messages from the server's stdout.
struct MessageReader {
    pending: PendingRequests,
    notifications: broadcast::Sender<ServerNotification>,
    state: Arc<RwLock<ServerState>>,
    responder: mpsc::Sender<String>,
    settings: serde_json::Value,
    connection: Arc<AtomicU64>,
    /// Connection this reader serves; its EOF only counts while current.
    connection_id: u64,
}

impl MessageReader {
    async fn run<R: AsyncBufRead + Unpin>(self, mut reader: R) {
        let mut content_length: Option<usize> = None;
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            match reader.read_line(&mut line_buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = line_buf.trim();
                    if let Some(len) = line.strip_prefix("Content-Length:") {
                        content_length = len.trim().parse().ok();
                    } else if line.is_empty() {
                        if let Some(len) = content_length.take() {
                            let mut content = vec![0u8; len];
                            if reader.read_exact(&mut content).await.is_err() {
                                break;
                            }
                            match serde_json::from_slice::<serde_json::Value>(&content) {
                                Ok(msg) => self.handle_message(msg).await,
                                Err(e) => warn!(error = %e, "Discarding malformed server message"),
                            }
                        }
                    }
                }
                Err(_) => break,
            }
        }

        if self.connection.load(Ordering::SeqCst) != self.connection_id {
            debug!(connection = self.connection_id, "Retired server connection closed");
            return;
        }
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if *guard != ServerState::Shutdown {
            warn!("Language server connection closed");
            *guard = ServerState::Error;
        }
    }

    async fn handle_message(&self, msg: serde_json::Value) {
        let method = msg.get("method").and_then(|m| m.as_str());
        let id = msg.get("id");

        match (method, id) {
            (None, Some(id)) => {
                if let Some(id) = id.as_u64() {
                    if let Some(tx) = self.pending.lock().await.remove(&id) {
                        let _ = tx.send(msg);
                    }
                }
            }
            (Some(method), Some(id)) => {
                let response = self.answer_server_request(method, msg.get("params"), id.clone());
                if let Ok(text) = serde_json::to_string(&response) {
                    let _ = self.responder.send(text).await;
                }
            }
            (Some(method), None) => {
                trace!(method, "Server notification");
                let _ = self.notifications.send(ServerNotification {
                    method: method.to_string(),
                    params: msg
                        .get("params")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null),
                });
            }
            (None, None) => {}
        }
    }

    fn answer_server_request(
        &self,
        method: &str,
        params: Option<&serde_json::Value>,
        id: serde_json::Value,
    ) -> serde_json::Value {
        match method {
            "workspace/configuration" => {
                let items = params
                    .and_then(|p| p.get("items"))
                    .and_then(|i| i.as_array())
                    .map(|arr| arr.len())
                    .unwrap_or(1);
                let section = self
                    .settings
                    .get("elixirLS")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": vec![section; items]
                })
            }
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create"
            | "window/showMessageRequest" => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": serde_json::Value::Null
            }),
            _ => serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": error_codes::METHOD_NOT_FOUND,
                    "message": format!("Unhandled server request: {}", method)
                }
            }),
        }
    }
}

/// Document synchronization notifications gated by the client's selector.
const SYNC_METHODS: &[&str] = &[
    "textDocument/didOpen",
    "textDocument/didChange",
    "textDocument/didSave",
    "textDocument/didClose",
];

/// The document a synchronization notification refers to.
///
/// Only `didOpen` carries a language id; for the others it is inferred from
/// the URI's extension.
fn synced_document(method: &str, params: &serde_json::Value) -> Option<TextDocument> {
    if !SYNC_METHODS.contains(&method) {
        return None;
    }
    let uri = Url::parse(params.pointer("/textDocument/uri")?.as_str()?).ok()?;
    let language_id = match params.pointer("/textDocument/languageId").and_then(|l| l.as_str()) {
        Some(language_id) => language_id.to_string(),
        None => {
            let ext = std::path::Path::new(uri.path())
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            language_id_for_extension(ext).to_string()
        }
    };
    Some(TextDocument::new(uri, language_id))
}

/// Parameters of `textDocument/didOpen`.
pub fn did_open_params(document: &TextDocument, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": document.uri.to_string(),
            "languageId": document.language_id,
            "version": document.version,
            "text": text
        }
    })
}

/// Parameters of `textDocument/didClose`.
pub fn did_close_params(document: &TextDocument) -> serde_json::Value {
    serde_json::json!({
        "textDocument": { "uri": document.uri.to_string() }
    })
}
