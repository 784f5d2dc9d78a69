// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the per-folder settings surface (`elixirLS.*` keys) and the global
//! client configuration, supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default startup timeout (30 seconds).
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 30_000;

/// Default request timeout (10 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default dispose timeout (2 seconds).
pub const DEFAULT_DISPOSE_TIMEOUT_MS: u64 = 2_000;

/// Settings scoped to one workspace folder.
///
/// Keys mirror the editor surface (`elixirLS.projectDir`, ...) without the
/// `elixirLS.` prefix. Unknown keys are kept in `extra` and forwarded to the
/// language server through `workspace/didChangeConfiguration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSettings {
    /// Subdirectory of the folder that holds the mix project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<String>,

    /// Disable the ancestor search and treat the folder as its own project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_current_root_folder_as_project_dir: Option<bool>,

    /// Directory containing alternative launcher scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_server_override_path: Option<PathBuf>,

    /// Remaining settings, forwarded verbatim to the server.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FolderSettings {
    /// Whether ancestor folder search is disabled.
    pub fn uses_current_root_folder(&self) -> bool {
        self.use_current_root_folder_as_project_dir.unwrap_or(false)
    }

    /// Set the project directory override.
    pub fn with_project_dir(mut self, dir: impl Into<String>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Set the `useCurrentRootFolderAsProjectDir` flag.
    pub fn with_current_root_folder(mut self, enabled: bool) -> Self {
        self.use_current_root_folder_as_project_dir = Some(enabled);
        self
    }

    /// Set the launcher override path.
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.language_server_override_path = Some(path.into());
        self
    }

    /// Overlay `other` on top of `self`; set values in `other` win.
    pub fn merged_with(&self, other: &FolderSettings) -> FolderSettings {
        let mut result = self.clone();
        if other.project_dir.is_some() {
            result.project_dir = other.project_dir.clone();
        }
        if other.use_current_root_folder_as_project_dir.is_some() {
            result.use_current_root_folder_as_project_dir =
                other.use_current_root_folder_as_project_dir;
        }
        if other.language_server_override_path.is_some() {
            result.language_server_override_path = other.language_server_override_path.clone();
        }
        for (key, value) in &other.extra {
            result.extra.insert(key.clone(), value.clone());
        }
        result
    }

    /// Settings payload as the server expects it (`{"elixirLS": {...}}`).
    pub fn to_server_settings(&self) -> serde_json::Value {
        let inner = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        serde_json::json!({ "elixirLS": inner })
    }
}

/// Global client configuration as stored on disk.
///
/// Can be defined in ~/.elixir-ls-client/config.json (or .yaml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Directory containing the ElixirLS release launcher scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_dir: Option<PathBuf>,

    /// Server startup timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_timeout_ms: Option<u64>,

    /// Request timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// How long teardown waits for a server to stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispose_timeout_ms: Option<u64>,

    /// Log filter directive (e.g. "elixir_ls_client=debug").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,

    /// Folder settings applied to every folder before its own settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_defaults: Option<FolderSettings>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub release_dir: PathBuf,
    pub startup_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub dispose_timeout_ms: u64,
    pub log_filter: Option<String>,
    pub folder_defaults: FolderSettings,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            release_dir: PathBuf::from("elixir-ls-release"),
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            dispose_timeout_ms: DEFAULT_DISPOSE_TIMEOUT_MS,
            log_filter: None,
            folder_defaults: FolderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_settings_deserialize_camel_case() {
        let json = r#"{
            "projectDir": "apps/web",
            "useCurrentRootFolderAsProjectDir": true,
            "dialyzerEnabled": false
        }"#;
        let settings: FolderSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.project_dir.as_deref(), Some("apps/web"));
        assert!(settings.uses_current_root_folder());
        assert_eq!(
            settings.extra.get("dialyzerEnabled"),
            Some(&serde_json::Value::Bool(false))
        );
    }

    #[test]
    fn test_folder_settings_merge() {
        let base = FolderSettings::default()
            .with_project_dir("base")
            .with_override_path("/opt/ls");
        let overlay = FolderSettings::default().with_project_dir("overlay");

        let merged = base.merged_with(&overlay);
        assert_eq!(merged.project_dir.as_deref(), Some("overlay"));
        assert_eq!(
            merged.language_server_override_path,
            Some(PathBuf::from("/opt/ls"))
        );
        assert!(!merged.uses_current_root_folder());
    }

    #[test]
    fn test_server_settings_payload() {
        let settings = FolderSettings::default().with_project_dir("apps/web");
        let payload = settings.to_server_settings();
        assert_eq!(payload["elixirLS"]["projectDir"], "apps/web");
    }

    #[test]
    fn test_resolved_config_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.startup_timeout_ms, DEFAULT_STARTUP_TIMEOUT_MS);
        assert_eq!(config.dispose_timeout_ms, DEFAULT_DISPOSE_TIMEOUT_MS);
        assert!(config.log_filter.is_none());
    }
}
