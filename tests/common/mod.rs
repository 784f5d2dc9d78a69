// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{broadcast, Semaphore};

use elixir_ls_client::lsp::{LanguageClient, LspError, LspResult, ServerNotification, ServerState};
use elixir_ls_client::registry::{ClientFactory, SessionSpec};

/// In-process stand-in for a language server.
pub struct FakeClient {
    name: String,
    pub spec: SessionSpec,
    pub commands: Vec<String>,
    pub fail_start: AtomicBool,
    pub starts: AtomicUsize,
    pub restarts: AtomicUsize,
    pub stops: AtomicUsize,
    /// `(command, arguments)` of every executeCommand request.
    pub executed: Mutex<Vec<(String, Vec<serde_json::Value>)>>,
    /// Canned result for executeCommand.
    pub response: Mutex<serde_json::Value>,
    /// When set, `start` holds until a permit is released.
    pub gate: Option<Arc<Semaphore>>,
    state: Mutex<ServerState>,
    notifications: broadcast::Sender<ServerNotification>,
}

impl FakeClient {
    pub fn new(spec: SessionSpec, commands: Vec<String>) -> Self {
        Self {
            name: spec.client_name(),
            spec,
            commands,
            fail_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            response: Mutex::new(serde_json::Value::Null),
            gate: None,
            state: Mutex::new(ServerState::Stopped),
            notifications: broadcast::channel(8).0,
        }
    }

    fn set_state(&self, state: ServerState) {
        *self.state.lock().unwrap() = state;
    }
}

#[async_trait]
impl LanguageClient for FakeClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ServerState {
        *self.state.lock().unwrap()
    }

    async fn start(&self) -> LspResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| LspError::StartupFailed("gate closed".to_string()))?
                .forget();
        }
        if self.fail_start.load(Ordering::SeqCst) {
            self.set_state(ServerState::Error);
            return Err(LspError::StartupFailed("launcher missing".to_string()));
        }
        self.set_state(ServerState::Ready);
        Ok(())
    }

    async fn restart(&self) -> LspResult<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.stop().await?;
        self.start().await
    }

    async fn stop(&self) -> LspResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.set_state(ServerState::Shutdown);
        Ok(())
    }

    fn server_commands(&self) -> Vec<String> {
        self.commands.clone()
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> LspResult<serde_json::Value> {
        if method == "workspace/executeCommand" {
            let command = params["command"].as_str().unwrap_or_default().to_string();
            let arguments = params["arguments"].as_array().cloned().unwrap_or_default();
            self.executed.lock().unwrap().push((command, arguments));
        }
        Ok(self.response.lock().unwrap().clone())
    }

    async fn notify(&self, _method: &str, _params: serde_json::Value) -> LspResult<()> {
        Ok(())
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<ServerNotification> {
        self.notifications.subscribe()
    }
}

/// Factory handing out [`FakeClient`]s and remembering them.
#[derive(Default)]
pub struct FakeFactory {
    pub created: Mutex<Vec<Arc<FakeClient>>>,
    pub commands: Vec<String>,
    pub fail_start: bool,
    /// Shared start gate handed to every client.
    pub gate: Option<Arc<Semaphore>>,
}

impl FakeFactory {
    pub fn with_commands(commands: &[&str]) -> Self {
        Self {
            commands: commands.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    /// Clients whose `start` blocks until [`FakeFactory::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Default::default()
        }
    }

    /// Let `permits` pending starts finish.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn clients(&self) -> Vec<Arc<FakeClient>> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl ClientFactory for FakeFactory {
    fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>> {
        let mut client = FakeClient::new(spec.clone(), self.commands.clone());
        client.fail_start = AtomicBool::new(self.fail_start);
        client.gate = self.gate.clone();
        let client = Arc::new(client);
        self.created.lock().unwrap().push(Arc::clone(&client));
        Ok(client)
    }
}

/// Build the fixture projects:
///
/// ```text
/// sample_umbrella/mix.exs
/// sample_umbrella/apps/child1/mix.exs
/// sample_umbrella/apps/child1/lib/child1.ex
/// sample_umbrella/apps/child1/test/child1_test.exs
/// single_folder_no_mix/elixir_script.exs
/// single_folder_mix/mix.exs
/// single_folder_mix/lib/mix_module.ex
/// ```
pub fn fixtures() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "sample_umbrella/mix.exs", "defmodule SampleUmbrella.MixProject do\nend\n");
    write(root, "sample_umbrella/apps/child1/mix.exs", "defmodule Child1.MixProject do\nend\n");
    write(root, "sample_umbrella/apps/child1/lib/child1.ex", "defmodule Child1 do\nend\n");
    write(
        root,
        "sample_umbrella/apps/child1/test/child1_test.exs",
        "defmodule Child1Test do\n  use ExUnit.Case\nend\n",
    );
    write(root, "single_folder_no_mix/elixir_script.exs", "IO.puts(:hello)\n");
    write(root, "single_folder_mix/mix.exs", "defmodule SingleFolderMix.MixProject do\nend\n");
    write(root, "single_folder_mix/lib/mix_module.ex", "defmodule MixModule do\nend\n");
    temp
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
