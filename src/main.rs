// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! elixir-ls-client entry point - routing inspection and session smoke runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use elixir_ls_client::config::{self, CliOptions, ResolvedConfig};
use elixir_ls_client::lsp::{did_close_params, did_open_params, ServerState, TextDocument};
use elixir_ls_client::registry::{ClientRegistry, ProcessClientFactory, RegistryOptions, SessionState};
use elixir_ls_client::telemetry::{init_telemetry, TelemetryConfig};
#[cfg(feature = "telemetry")]
use elixir_ls_client::telemetry::GLOBAL_METRICS;
use elixir_ls_client::terminal_links::TerminalLinkResolver;
use elixir_ls_client::testing::{NodeKind, TestController};
use elixir_ls_client::workspace::{Workspace, WorkspaceTracker};
use elixir_ls_client::VERSION;

/// Workspace-aware ElixirLS session router.
#[derive(Parser)]
#[command(name = "elixir-ls-client")]
#[command(author, version, about = "Workspace-aware ElixirLS session router", long_about = None)]
struct Cli {
    /// Directory containing the ElixirLS release scripts
    #[arg(long, env = "ELIXIR_LS_RELEASE_DIR", global = true)]
    release_dir: Option<PathBuf>,

    /// Log filter directive (e.g. "elixir_ls_client=debug")
    #[arg(long, env = "ELIXIR_LS_CLIENT_LOG", global = true)]
    log: Option<String>,

    /// Teardown timeout per server in milliseconds
    #[arg(long, global = true)]
    dispose_timeout_ms: Option<u64>,

    /// Show debug output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Workspace arguments shared by subcommands.
#[derive(clap::Args)]
struct WorkspaceArgs {
    /// Workspace folder (repeatable, in workspace order)
    #[arg(long = "folder", value_name = "DIR")]
    folders: Vec<PathBuf>,

    /// Multi-root workspace file
    #[arg(long)]
    workspace_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which session would serve each path
    Resolve {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Files to resolve
        paths: Vec<PathBuf>,
    },

    /// Open documents, start their sessions and report the routing table
    Start {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Documents to open
        paths: Vec<PathBuf>,

        /// Also list the ExUnit tests the servers report
        #[arg(long)]
        tests: bool,
    },

    /// Find source locations in text read from stdin
    Links {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Show configuration
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_options = CliOptions {
        release_dir: cli.release_dir,
        log_filter: cli.log,
        dispose_timeout_ms: cli.dispose_timeout_ms,
    };
    let config = config::load_config(cli_options)?;

    let mut telemetry = if cli.verbose {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default()
    };
    if let Some(filter) = &config.log_filter {
        telemetry = telemetry.with_filter(filter.clone());
    }
    let _guard = init_telemetry(&telemetry)?;

    match cli.command {
        Commands::Resolve { workspace, paths } => resolve(&config, &workspace, &paths),
        Commands::Start {
            workspace,
            paths,
            tests,
        } => start(&config, &workspace, &paths, tests, cli.verbose).await,
        Commands::Links { workspace } => links(&config, &workspace),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Version => {
            println!("elixir-ls-client {}", VERSION);
            Ok(())
        }
    }
}

/// Build the workspace from `--folder` arguments, loading each folder's
/// settings.
fn build_workspace(config: &ResolvedConfig, args: &WorkspaceArgs) -> anyhow::Result<Arc<WorkspaceTracker>> {
    let workspace = Arc::new(Workspace::with_defaults(config.folder_defaults.clone()));
    for dir in &args.folders {
        let dir = absolute(dir)?;
        let folder = workspace
            .add_folder_path(&dir)
            .with_context(|| format!("invalid folder {}", dir.display()))?;
        let settings = config::load_folder_settings(&dir)
            .with_context(|| format!("invalid settings in {}", dir.display()))?;
        workspace.set_folder_settings(&folder.uri, settings);
    }
    workspace.set_workspace_file(args.workspace_file.clone());
    Ok(Arc::new(WorkspaceTracker::new(workspace)))
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn document(path: &Path) -> anyhow::Result<TextDocument> {
    let path = absolute(path)?;
    TextDocument::from_path(&path).with_context(|| format!("not a file path: {}", path.display()))
}

fn resolve(config: &ResolvedConfig, args: &WorkspaceArgs, paths: &[PathBuf]) -> anyhow::Result<()> {
    let tracker = build_workspace(config, args)?;
    let registry = ClientRegistry::new(
        Arc::clone(&tracker),
        Arc::new(ProcessClientFactory::new(config.clone())),
    );

    println!("{} {}", "Mode:".bold(), tracker.mode().to_string().cyan());
    for path in paths {
        let doc = document(path)?;
        let key = registry.routing_key_for_uri(&doc.uri)?;
        let project_dir = tracker
            .project_dir_for_uri(&doc.uri)?
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {} {}  {} {}  {} {}",
            path.display().to_string().bright_white(),
            "lang".dimmed(),
            doc.language_id,
            "session".dimmed(),
            key.to_string().green(),
            "project".dimmed(),
            project_dir
        );
    }
    Ok(())
}

async fn start(
    config: &ResolvedConfig,
    args: &WorkspaceArgs,
    paths: &[PathBuf],
    list_tests: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let tracker = build_workspace(config, args)?;
    let registry = Arc::new(ClientRegistry::with_options(
        tracker,
        Arc::new(ProcessClientFactory::new(config.clone())),
        RegistryOptions {
            dispose_timeout: Duration::from_millis(config.dispose_timeout_ms),
        },
    ));

    let mut opened = Vec::new();
    for path in paths {
        let doc = document(path)?;
        if registry.handle_document_opened(&doc)? {
            println!("{} session for {}", "+".green(), path.display());
        }
        opened.push((doc, path.clone()));
    }

    for (doc, path) in &opened {
        let Some(session) = registry.client_promise_by_document(doc)? else {
            continue;
        };
        match session.wait_until_ready().await {
            Ok(client) => {
                let text = std::fs::read_to_string(path).unwrap_or_default();
                client
                    .notify("textDocument/didOpen", did_open_params(doc, &text))
                    .await?;
            }
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        }
    }

    println!("\n{}", "Sessions".bold());
    for session in registry.all_sessions() {
        let state = match session.state() {
            SessionState::Ready => "ready".green(),
            SessionState::Pending => "pending".yellow(),
            SessionState::Failed(_) => "failed".red(),
        };
        println!("  {} [{}]", session.key().to_string().bright_white(), state);
        if let SessionState::Failed(message) = session.state() {
            println!("    {}", message.dimmed());
            continue;
        }
        for command in session.client().server_commands() {
            println!("    {}", command.dimmed());
        }
    }

    if list_tests {
        let controller = TestController::new(Arc::clone(&registry));
        let tree = controller.refresh().await?;
        println!("\n{} ({} tests)", "Tests".bold(), tree.test_count());
        for (id, depth) in tree.walk() {
            let Some(node) = tree.node(id) else { continue };
            let label = match node.kind {
                NodeKind::Test | NodeKind::Doctest => node.label.normal(),
                _ => node.label.bold(),
            };
            println!("{}{} {}", "  ".repeat(depth + 1), node.kind.to_string().dimmed(), label);
        }
    }

    for (doc, _) in &opened {
        if let Ok(Some(client)) = registry.client_by_document(doc) {
            if client.state() == ServerState::Ready {
                let _ = client.notify("textDocument/didClose", did_close_params(doc)).await;
            }
        }
    }
    registry.deactivate().await;

    #[cfg(feature = "telemetry")]
    if verbose {
        eprintln!("\n{}", GLOBAL_METRICS.snapshot().format_report().dimmed());
    }
    #[cfg(not(feature = "telemetry"))]
    let _ = verbose;
    Ok(())
}

fn links(config: &ResolvedConfig, args: &WorkspaceArgs) -> anyhow::Result<()> {
    use std::io::BufRead;

    let tracker = build_workspace(config, args)?;
    let resolver = TerminalLinkResolver::new(&tracker);
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        for link in resolver.links(&line, None) {
            println!("{}:{}", link.path.display(), link.line);
        }
    }
    Ok(())
}
