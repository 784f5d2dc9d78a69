// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading the global client configuration and per-folder settings
//! from JSON and YAML files.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{FolderSettings, GlobalConfig};

/// Folder settings files to search for (in order).
pub const FOLDER_CONFIG_FILES: &[&str] = &[".elixir-ls.json", ".elixir-ls.yaml", ".elixir-ls.yml"];

/// Editor settings file holding flat `elixirLS.*` keys.
pub const EDITOR_SETTINGS_FILE: &str = ".vscode/settings.json";

/// Prefix of the editor setting keys.
pub const SETTINGS_PREFIX: &str = "elixirLS.";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".elixir-ls-client";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.elixir-ls-client/config.json.
pub fn load_global_config() -> Result<Option<GlobalConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_global_config_file(&path).map(Some)
}

/// Load a global configuration file (JSON or YAML).
pub fn load_global_config_file(path: &Path) -> Result<GlobalConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_by_extension(path, &content)
}

/// Load the settings of one workspace folder.
///
/// A dedicated `.elixir-ls.*` file wins over the editor settings file.
/// Returns default settings when neither exists.
pub fn load_folder_settings(folder_path: &Path) -> Result<FolderSettings, ConfigError> {
    for filename in FOLDER_CONFIG_FILES {
        let path = folder_path.join(filename);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            return parse_by_extension(&path, &content);
        }
    }

    let editor_settings = folder_path.join(EDITOR_SETTINGS_FILE);
    if editor_settings.exists() {
        let content = std::fs::read_to_string(&editor_settings)?;
        return parse_editor_settings(&content);
    }

    Ok(FolderSettings::default())
}

/// Parse an editor settings file, keeping only `elixirLS.*` keys.
pub fn parse_editor_settings(content: &str) -> Result<FolderSettings, ConfigError> {
    let stripped = strip_jsonc(content);
    let value: serde_json::Value = serde_json::from_str(&stripped)?;
    let object = value.as_object().ok_or_else(|| {
        ConfigError::InvalidFormat("editor settings must be a JSON object".to_string())
    })?;

    let scoped: serde_json::Map<String, serde_json::Value> = object
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(SETTINGS_PREFIX)
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect();

    serde_json::from_value(serde_json::Value::Object(scoped)).map_err(ConfigError::from)
}

/// Turn the JSON-with-comments dialect of editor settings into plain JSON.
///
/// Drops `//` and `/* */` comments and trailing commas before `}` or `]`,
/// leaving string contents untouched.
fn strip_jsonc(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    // Byte offset in `out` of a comma that may turn out to be trailing.
    let mut pending_comma: Option<usize> = None;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
            }
            '}' | ']' => {
                if let Some(at) = pending_comma.take() {
                    out.replace_range(at..at + 1, " ");
                }
                out.push(c);
            }
            ',' => {
                pending_comma = Some(out.len());
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                pending_comma = None;
                if c == '"' {
                    in_string = true;
                }
                out.push(c);
            }
        }
    }
    out
}

fn parse_by_extension<T: serde::de::DeserializeOwned>(
    path: &Path,
    content: &str,
) -> Result<T, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(ConfigError::from),
        _ => serde_json::from_str(content).map_err(ConfigError::from),
    }
}
