// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ExUnit test controller.
//!
//! Discovery walks each distinct project directory for test files and asks
//! the session serving that directory to list the tests in each file
//! (`getExUnitTestsInFile`). The resulting [`TestTree`] is marked stale
//! whenever the registry's routing table changes.
//!
//! ```text
//! project dirs ──walkdir──► test files ──executeCommand──► TestTree
//!                                                            │
//!                                      TestRun::for_node ◄───┘
//!                                             │
//!                                        mix test ...
//! ```

mod discovery;
mod runner;
mod tree;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::commands::{execute_prefixed, prefixes};
use crate::error::{RegistryError, ToolError};
use crate::registry::{ClientRegistry, RoutingKey, Subscription};

pub use discovery::{find_test_files, parse_tests_response, project_folders, TEST_FILE_GLOB};
pub use runner::{TestOutcome, TestRun, TestRunner};
pub use tree::{DescribeEntry, ModuleEntry, NodeId, NodeKind, TestEntry, TestMeta, TestNode, TestTree};

pub struct TestController {
    registry: Arc<ClientRegistry>,
    runner: TestRunner,
    tree: Mutex<TestTree>,
    stale: Arc<AtomicBool>,
    _subscription: Mutex<Subscription>,
}

impl TestController {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self::with_runner(registry, TestRunner::new())
    }

    pub fn with_runner(registry: Arc<ClientRegistry>, runner: TestRunner) -> Self {
        let stale = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&stale);
        let subscription = registry.on_did_change(move || {
            flag.store(true, Ordering::SeqCst);
        });
        Self {
            registry,
            runner,
            tree: Mutex::new(TestTree::new()),
            stale,
            _subscription: Mutex::new(subscription),
        }
    }

    /// Whether the routing table changed since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Snapshot of the last discovered tree.
    pub fn tree(&self) -> TestTree {
        match self.tree.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Rediscover tests in every project with a registered session.
    ///
    /// A project whose server failed to start is skipped and leaves the
    /// controller stale. Any other error keeps the previous tree and also
    /// leaves it stale.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TestTree, ToolError> {
        // Cleared first so a change during discovery leaves the tree stale.
        self.stale.store(false, Ordering::SeqCst);

        let (tree, complete) = match self.discover().await {
            Ok(discovered) => discovered,
            Err(e) => {
                self.stale.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };
        if !complete {
            self.stale.store(true, Ordering::SeqCst);
        }

        info!(nodes = tree.len(), tests = tree.test_count(), complete, "Test discovery finished");
        match self.tree.lock() {
            Ok(mut guard) => *guard = tree.clone(),
            Err(poisoned) => *poisoned.into_inner() = tree.clone(),
        }
        Ok(tree)
    }

    /// Build a fresh tree; the flag is false when some project was skipped
    /// because its server is unavailable.
    async fn discover(&self) -> Result<(TestTree, bool), ToolError> {
        let keys = self.registry.keys();
        let mut tree = TestTree::new();
        let mut complete = true;
        'folders: for (folder, project_dir) in project_folders(self.registry.tracker()) {
            if !keys.contains(&RoutingKey::Folder(folder.key())) {
                debug!(folder = %folder.name, "No session for folder, skipping test discovery");
                continue;
            }

            let files = find_test_files(&project_dir)?;
            let mut workspace = None;
            for file in files {
                let Ok(uri) = Url::from_file_path(&file) else {
                    continue;
                };
                let session = self.registry.client_promise_by_uri(&uri)?;
                let client = match session.wait_until_ready().await {
                    Ok(client) => client,
                    Err(e @ (RegistryError::StartupFailed { .. } | RegistryError::Disposed(_))) => {
                        warn!(folder = %folder.name, error = %e, "Language server unavailable, skipping test discovery");
                        complete = false;
                        continue 'folders;
                    }
                    Err(e) => return Err(e.into()),
                };
                let response = execute_prefixed(
                    client.as_ref(),
                    prefixes::EXUNIT_TESTS_IN_FILE,
                    vec![serde_json::json!(uri.to_string())],
                )
                .await?;
                let Some(response) = response else {
                    warn!(client = client.name(), "Server does not list ExUnit tests");
                    break;
                };
                let node = *workspace
                    .get_or_insert_with(|| tree.add_workspace(folder.name.clone(), &project_dir));
                match parse_tests_response(response) {
                    Ok(modules) => {
                        tree.add_file(node, &file, &modules);
                    }
                    Err(e) => warn!(file = %file.display(), error = %e, "Could not list tests"),
                }
            }
        }
        Ok((tree, complete))
    }

    /// Run the tests under `id` in the last discovered tree.
    pub async fn run(
        &self,
        id: NodeId,
        sink: impl FnMut(&str) + Send,
    ) -> Result<TestOutcome, ToolError> {
        let run = TestRun::for_node(&self.tree(), id)
            .ok_or_else(|| ToolError::InvalidInput(format!("unknown test node {:?}", id)))?;
        self.runner.run(&run, sink).await
    }
}

impl std::fmt::Debug for TestController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestController")
            .field("runner", &self.runner)
            .field("stale", &self.is_stale())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::ScriptedClient;
    use crate::lsp::{LanguageClient, LspResult, TextDocument};
    use crate::registry::{ClientFactory, SessionSpec};
    use crate::workspace::{Workspace, WorkspaceTracker};
    use std::fs;
    use tempfile::TempDir;

    struct ListingFactory;

    impl ClientFactory for ListingFactory {
        fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>> {
            Ok(ScriptedClient::named(
                spec.client_name(),
                &["getExUnitTestsInFile:1"],
                serde_json::json!([
                    {"module": "AppTest", "line": 1, "describes": [
                        {"describe": null, "line": null, "tests": [
                            {"name": "works", "line": 3, "type": "test"}
                        ]}
                    ]}
                ]),
            ))
        }
    }

    fn setup() -> (TempDir, Arc<ClientRegistry>) {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        fs::create_dir_all(app.join("test")).unwrap();
        fs::write(app.join("mix.exs"), "").unwrap();
        fs::write(app.join("test/app_test.exs"), "").unwrap();

        let workspace = Arc::new(Workspace::new());
        workspace.add_folder_path(&app).unwrap();
        let tracker = Arc::new(WorkspaceTracker::new(workspace));
        let registry = Arc::new(ClientRegistry::new(tracker, Arc::new(ListingFactory)));
        (temp, registry)
    }

    #[tokio::test]
    async fn test_refresh_skips_folders_without_session() {
        let (_temp, registry) = setup();
        let controller = TestController::new(registry);

        let tree = controller.refresh().await.unwrap();
        assert!(tree.is_empty());
        assert!(!controller.is_stale());
    }

    #[tokio::test]
    async fn test_refresh_builds_tree_and_tracks_changes() {
        let (temp, registry) = setup();
        let controller = TestController::new(Arc::clone(&registry));

        let doc = TextDocument::from_path(&temp.path().join("app/mix.exs")).unwrap();
        registry.handle_document_opened(&doc).unwrap();
        assert!(controller.is_stale());

        let tree = controller.refresh().await.unwrap();
        assert_eq!(tree.test_count(), 1);
        assert!(tree.find(NodeKind::File, "test/app_test.exs").is_some());
        assert!(!controller.is_stale());

        registry.deactivate().await;
        assert!(controller.is_stale());
    }

    /// Lists tests like [`ListingFactory`] except for the `broken` folder,
    /// whose server never starts.
    struct PartlyBrokenFactory;

    impl ClientFactory for PartlyBrokenFactory {
        fn create(&self, spec: &SessionSpec) -> LspResult<Arc<dyn LanguageClient>> {
            match &spec.folder {
                Some(folder) if folder.name == "broken" => Ok(ScriptedClient::failing(spec.client_name())),
                _ => ListingFactory.create(spec),
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_skips_failed_server_and_stays_stale() {
        let temp = TempDir::new().unwrap();
        for name in ["broken", "app"] {
            let dir = temp.path().join(name);
            fs::create_dir_all(dir.join("test")).unwrap();
            fs::write(dir.join("mix.exs"), "").unwrap();
            fs::write(dir.join(format!("test/{}_test.exs", name)), "").unwrap();
        }
        let workspace = Arc::new(Workspace::new());
        workspace.add_folder_path(&temp.path().join("broken")).unwrap();
        workspace.add_folder_path(&temp.path().join("app")).unwrap();
        let tracker = Arc::new(WorkspaceTracker::new(workspace));
        let registry = Arc::new(ClientRegistry::new(tracker, Arc::new(PartlyBrokenFactory)));
        for name in ["broken", "app"] {
            let doc = TextDocument::from_path(&temp.path().join(name).join("mix.exs")).unwrap();
            registry.handle_document_opened(&doc).unwrap();
        }

        let controller = TestController::new(Arc::clone(&registry));
        let tree = controller.refresh().await.unwrap();

        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.test_count(), 1);
        assert!(tree.find(NodeKind::File, "test/app_test.exs").is_some());
        assert!(tree.find(NodeKind::File, "test/broken_test.exs").is_none());
        assert!(controller.is_stale());
        assert_eq!(controller.tree().test_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_with_only_failed_server() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        fs::create_dir_all(dir.join("test")).unwrap();
        fs::write(dir.join("mix.exs"), "").unwrap();
        fs::write(dir.join("test/broken_test.exs"), "").unwrap();
        let workspace = Arc::new(Workspace::new());
        workspace.add_folder_path(&dir).unwrap();
        let tracker = Arc::new(WorkspaceTracker::new(workspace));
        let registry = Arc::new(ClientRegistry::new(tracker, Arc::new(PartlyBrokenFactory)));
        let doc = TextDocument::from_path(&dir.join("mix.exs")).unwrap();
        registry.handle_document_opened(&doc).unwrap();

        let controller = TestController::new(registry);
        let tree = controller.refresh().await.unwrap();
        assert!(tree.is_empty());
        assert!(controller.is_stale());
    }

    #[tokio::test]
    async fn test_run_unknown_node() {
        let (_temp, registry) = setup();
        let controller = TestController::new(registry);
        let result = controller.run(NodeId::from_index(42), |_| {}).await;
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }
}
