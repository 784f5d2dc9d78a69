// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool and test controller behaviour over a multi-folder workspace.

mod common;

use std::sync::Arc;

use url::Url;

use common::{fixtures, FakeFactory};
use elixir_ls_client::commands::{ClientHint, CustomCommands, LlmTools, PipeOperation};
use elixir_ls_client::lsp::{Position, TextDocument};
use elixir_ls_client::registry::ClientRegistry;
use elixir_ls_client::testing::{NodeKind, TestController};
use elixir_ls_client::workspace::{Workspace, WorkspaceTracker};

const COMMANDS: &[&str] = &[
    "mixClean:1",
    "expandMacro:1",
    "manipulatePipes:1",
    "getExUnitTestsInFile:1",
    "llmDefinition:1",
    "llmTypeInfo:1",
];

fn setup(factory: FakeFactory) -> (tempfile::TempDir, Arc<FakeFactory>, Arc<ClientRegistry>) {
    let temp = fixtures();
    let workspace = Arc::new(Workspace::new());
    workspace
        .add_folder_path(&temp.path().join("sample_umbrella"))
        .unwrap();
    workspace
        .add_folder_path(&temp.path().join("single_folder_mix"))
        .unwrap();
    let tracker = Arc::new(WorkspaceTracker::new(workspace));
    let factory = Arc::new(factory);
    let registry = Arc::new(ClientRegistry::new(tracker, factory.clone()));
    (temp, factory, registry)
}

fn open(temp: &tempfile::TempDir, registry: &ClientRegistry, rel: &str) -> TextDocument {
    let doc = TextDocument::from_path(&temp.path().join(rel)).unwrap();
    registry.handle_document_opened(&doc).unwrap();
    doc
}

#[tokio::test]
async fn test_expand_macro_goes_to_owning_client() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    open(&temp, &registry, "sample_umbrella/mix.exs");
    let doc = open(&temp, &registry, "single_folder_mix/lib/mix_module.ex");
    assert_eq!(factory.created_count(), 2);

    for client in factory.clients() {
        *client.response.lock().unwrap() = serde_json::json!({"expand": "IO.inspect(1)"});
    }

    let commands = CustomCommands::new(Arc::clone(&registry));
    let output = commands.expand_macro(&doc.uri, "dbg(1)", 0).await.unwrap();
    assert!(!output.is_error);
    assert!(output.content.contains("IO.inspect(1)"));

    let executed: Vec<usize> = factory
        .clients()
        .iter()
        .map(|c| c.executed.lock().unwrap().len())
        .collect();
    assert_eq!(executed, vec![0, 1]);

    let clients = factory.clients();
    let (command, args) = clients[1].executed.lock().unwrap()[0].clone();
    assert_eq!(command, "expandMacro:1");
    assert_eq!(args[0], serde_json::json!(doc.uri.to_string()));
}

#[tokio::test]
async fn test_manipulate_pipes_arguments() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    let doc = open(&temp, &registry, "sample_umbrella/apps/child1/lib/child1.ex");

    let commands = CustomCommands::new(registry);
    let output = commands
        .manipulate_pipes(PipeOperation::FromPipe, &doc.uri, Position::new(4, 2))
        .await
        .unwrap();
    assert!(!output.is_error);

    let clients = factory.clients();
    let (_, args) = clients[0].executed.lock().unwrap()[0].clone();
    assert_eq!(
        args,
        vec![
            serde_json::json!("fromPipe"),
            serde_json::json!(doc.uri.to_string()),
            serde_json::json!(4),
            serde_json::json!(2),
        ]
    );
}

#[tokio::test]
async fn test_mix_clean_reaches_every_client() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    open(&temp, &registry, "sample_umbrella/mix.exs");
    open(&temp, &registry, "single_folder_mix/mix.exs");

    let output = CustomCommands::new(registry).mix_clean(true).await.unwrap();
    assert!(!output.is_error, "{}", output);
    for client in factory.clients() {
        let executed = client.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].1, vec![serde_json::json!(true)]);
    }
}

#[tokio::test]
async fn test_unadvertised_command_is_reported_not_raised() {
    let (temp, factory, registry) = setup(FakeFactory::default());
    open(&temp, &registry, "single_folder_mix/mix.exs");

    let tools = LlmTools::new(registry);
    let output = tools
        .definition(&ClientHint::none(), "MixModule")
        .await
        .unwrap();
    assert!(output.is_error);
    assert!(output.content.contains("llmDefinition"));
    assert!(factory.clients()[0].executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_type_info_uses_file_client() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    open(&temp, &registry, "sample_umbrella/mix.exs");
    open(&temp, &registry, "single_folder_mix/mix.exs");

    let path = temp.path().join("single_folder_mix/lib/mix_module.ex");
    LlmTools::new(registry).type_info(&path).await.unwrap();

    let clients = factory.clients();
    assert!(clients[0].executed.lock().unwrap().is_empty());
    assert_eq!(clients[1].executed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tools_do_not_create_sessions() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    let uri = Url::from_file_path(temp.path().join("single_folder_mix/lib/mix_module.ex")).unwrap();

    let result = CustomCommands::new(Arc::clone(&registry))
        .expand_macro(&uri, "dbg(1)", 0)
        .await;
    assert!(result.is_err());
    assert_eq!(factory.created_count(), 0);
    assert_eq!(registry.clients_len(), 0);
}

#[tokio::test]
async fn test_controller_discovers_umbrella_tests() {
    let (temp, factory, registry) = setup(FakeFactory::with_commands(COMMANDS));
    open(&temp, &registry, "sample_umbrella/apps/child1/lib/child1.ex");
    for client in factory.clients() {
        *client.response.lock().unwrap() = serde_json::json!([
            {"module": "Child1Test", "line": 1, "describes": [
                {"describe": null, "line": null, "tests": [
                    {"name": "greets the world", "line": 5, "type": "test"}
                ]}
            ]}
        ]);
    }

    let controller = TestController::new(Arc::clone(&registry));
    let tree = controller.refresh().await.unwrap();

    // Only the umbrella has a session; single_folder_mix is skipped.
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.test_count(), 1);
    assert!(tree
        .find(NodeKind::File, "apps/child1/test/child1_test.exs")
        .is_some());

    let clients = factory.clients();
    let executed = clients[0].executed.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].0, "getExUnitTestsInFile:1");
}
