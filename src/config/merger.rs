// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{GlobalConfig, ResolvedConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub release_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub dispose_timeout_ms: Option<u64>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Global config (~/.elixir-ls-client/config.json)
/// 3. Default values
///
/// Per-folder settings are layered later, on top of `folder_defaults`.
pub fn merge_config(global: Option<GlobalConfig>, cli: CliOptions) -> ResolvedConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_global_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_global_config(result: &mut ResolvedConfig, config: &GlobalConfig) {
    if let Some(ref dir) = config.release_dir {
        result.release_dir = dir.clone();
    }

    if let Some(ms) = config.startup_timeout_ms {
        result.startup_timeout_ms = ms;
    }

    if let Some(ms) = config.request_timeout_ms {
        result.request_timeout_ms = ms;
    }

    if let Some(ms) = config.dispose_timeout_ms {
        result.dispose_timeout_ms = ms;
    }

    if config.log_filter.is_some() {
        result.log_filter = config.log_filter.clone();
    }

    if let Some(ref defaults) = config.folder_defaults {
        result.folder_defaults = result.folder_defaults.merged_with(defaults);
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref dir) = cli.release_dir {
        result.release_dir = dir.clone();
    }

    if cli.log_filter.is_some() {
        result.log_filter = cli.log_filter.clone();
    }

    if let Some(ms) = cli.dispose_timeout_ms {
        result.dispose_timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FolderSettings;

    #[test]
    fn test_merge_defaults_only() {
        let config = merge_config(None, CliOptions::default());
        assert_eq!(config.release_dir, PathBuf::from("elixir-ls-release"));
    }

    #[test]
    fn test_global_overrides_defaults() {
        let global = GlobalConfig {
            release_dir: Some(PathBuf::from("/opt/elixir-ls")),
            request_timeout_ms: Some(1_000),
            folder_defaults: Some(FolderSettings::default().with_project_dir("app")),
            ..Default::default()
        };

        let config = merge_config(Some(global), CliOptions::default());
        assert_eq!(config.release_dir, PathBuf::from("/opt/elixir-ls"));
        assert_eq!(config.request_timeout_ms, 1_000);
        assert_eq!(config.folder_defaults.project_dir.as_deref(), Some("app"));
    }

    #[test]
    fn test_cli_wins() {
        let global = GlobalConfig {
            release_dir: Some(PathBuf::from("/opt/elixir-ls")),
            log_filter: Some("warn".to_string()),
            ..Default::default()
        };
        let cli = CliOptions {
            release_dir: Some(PathBuf::from("/cli/release")),
            log_filter: Some("debug".to_string()),
            dispose_timeout_ms: Some(10),
        };

        let config = merge_config(Some(global), cli);
        assert_eq!(config.release_dir, PathBuf::from("/cli/release"));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert_eq!(config.dispose_timeout_ms, 10);
    }
}
