// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Launcher script resolution for ElixirLS processes.
//!
//! The ElixirLS release ships one launcher script per process kind. A folder
//! can point `languageServerOverridePath` at a directory with its own scripts
//! (e.g. a locally built checkout).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::FolderSettings;

/// Kind of ElixirLS process to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchKind {
    LanguageServer,
    DebugAdapter,
    ElixirCheck,
}

impl LaunchKind {
    /// Base name of the launcher script.
    pub fn script_name(self) -> &'static str {
        match self {
            Self::LanguageServer => "language_server",
            Self::DebugAdapter => "debug_adapter",
            Self::ElixirCheck => "elixir_check",
        }
    }

    /// Platform-specific file name of the launcher script.
    pub fn script_file_name(self) -> String {
        format!("{}.{}", self.script_name(), script_extension())
    }
}

impl std::fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.script_name())
    }
}

#[cfg(windows)]
fn script_extension() -> &'static str {
    "bat"
}

#[cfg(not(windows))]
fn script_extension() -> &'static str {
    "sh"
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub kind: LaunchKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables added on top of the inherited environment.
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    /// Whether the launcher script exists on disk.
    pub fn exists(&self) -> bool {
        self.program.is_file()
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Merge environment variables; later values win.
    pub fn with_env(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Resolves launcher scripts for a release directory.
#[derive(Debug, Clone)]
pub struct Launcher {
    release_dir: PathBuf,
}

impl Launcher {
    /// Create a launcher rooted at the ElixirLS release directory.
    pub fn new(release_dir: impl Into<PathBuf>) -> Self {
        Self {
            release_dir: release_dir.into(),
        }
    }

    /// The release directory scripts are taken from by default.
    pub fn release_dir(&self) -> &Path {
        &self.release_dir
    }

    /// Directory that provides scripts for a folder's settings.
    pub fn script_dir<'a>(&'a self, settings: &'a FolderSettings) -> &'a Path {
        settings
            .language_server_override_path
            .as_deref()
            .unwrap_or(&self.release_dir)
    }

    /// Resolve the invocation of a process kind.
    pub fn resolve(&self, kind: LaunchKind, settings: &FolderSettings) -> LaunchSpec {
        let program = self.script_dir(settings).join(kind.script_file_name());
        LaunchSpec {
            kind,
            program,
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    /// Resolve a debug adapter invocation with a working directory and
    /// user-provided environment variables.
    pub fn debug_adapter(
        &self,
        settings: &FolderSettings,
        cwd: impl Into<PathBuf>,
        env: &HashMap<String, String>,
    ) -> LaunchSpec {
        self.resolve(LaunchKind::DebugAdapter, settings)
            .with_cwd(cwd)
            .with_env(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_script_names() {
        assert_eq!(LaunchKind::LanguageServer.script_name(), "language_server");
        assert_eq!(LaunchKind::DebugAdapter.script_name(), "debug_adapter");
        assert_eq!(LaunchKind::ElixirCheck.script_name(), "elixir_check");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_script_file_name_unix() {
        assert_eq!(
            LaunchKind::LanguageServer.script_file_name(),
            "language_server.sh"
        );
    }

    #[cfg(windows)]
    #[test]
    fn test_script_file_name_windows() {
        assert_eq!(
            LaunchKind::LanguageServer.script_file_name(),
            "language_server.bat"
        );
    }

    #[test]
    fn test_resolve_uses_release_dir() {
        let launcher = Launcher::new("/opt/elixir-ls");
        let spec = launcher.resolve(LaunchKind::LanguageServer, &FolderSettings::default());
        assert_eq!(
            spec.program,
            PathBuf::from("/opt/elixir-ls").join(LaunchKind::LanguageServer.script_file_name())
        );
        assert!(spec.cwd.is_none());
    }

    #[test]
    fn test_override_path_wins() {
        let launcher = Launcher::new("/opt/elixir-ls");
        let settings = FolderSettings::default().with_override_path("/src/elixir-ls/scripts");
        let spec = launcher.resolve(LaunchKind::ElixirCheck, &settings);
        assert!(spec.program.starts_with("/src/elixir-ls/scripts"));
    }

    #[test]
    fn test_debug_adapter_merges_env() {
        let launcher = Launcher::new("/opt/elixir-ls");
        let mut env = HashMap::new();
        env.insert("MIX_ENV".to_string(), "test".to_string());

        let spec = launcher.debug_adapter(&FolderSettings::default(), "/work/app", &env);
        assert_eq!(spec.kind, LaunchKind::DebugAdapter);
        assert_eq!(spec.cwd, Some(PathBuf::from("/work/app")));
        assert_eq!(spec.env.get("MIX_ENV").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_exists() {
        let temp = TempDir::new().unwrap();
        let launcher = Launcher::new(temp.path());
        let spec = launcher.resolve(LaunchKind::LanguageServer, &FolderSettings::default());
        assert!(!spec.exists());

        std::fs::write(&spec.program, "#!/bin/sh\n").unwrap();
        assert!(spec.exists());
    }
}
