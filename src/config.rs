/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Server executable used when nothing else is configured.
pub const DEFAULT_SERVER_PATH: &str = "jasmin-lsp";

/// Prefix of every setting in the workspace settings file.
pub const SECTION: &str = "jasmin";

/// Workspace-scoped settings of the integration.
///
/// Serialized with the same camelCase keys the settings file uses, which is
/// also the shape sent to the server as `initializationOptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Server executable, when the workspace overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Server launch arguments, when the workspace overrides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Entry-point source file. `None` and `Some("")` are different states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_file: Option<String>,

    /// Namespace name to directory.
    #[serde(default)]
    pub namespace_paths: BTreeMap<String, String>,
}

/// Identifies one persisted setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// `jasmin.path`
    ServerPath,
    /// `jasmin.args`
    ServerArgs,
    /// `jasmin.masterFile`
    MasterFile,
    /// `jasmin.namespacePaths`
    NamespacePaths,
}

impl SettingKey {
    /// Every key, in settings file order.
    pub const ALL: [Self; 4] = [
        Self::ServerPath,
        Self::ServerArgs,
        Self::MasterFile,
        Self::NamespacePaths,
    ];

    /// Key name inside the `jasmin` section.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerPath => "path",
            Self::ServerArgs => "args",
            Self::MasterFile => "masterFile",
            Self::NamespacePaths => "namespacePaths",
        }
    }

    /// Fully qualified key as written in the settings file.
    #[must_use]
    pub fn qualified(self) -> String {
        format!("{SECTION}.{}", self.name())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SECTION}.{}", self.name())
    }
}

impl Settings {
    /// The master file to act on. An empty setting is kept as written but
    /// selects no file.
    #[must_use]
    pub fn active_master_file(&self) -> Option<&str> {
        self.master_file.as_deref().filter(|raw| !raw.is_empty())
    }

    /// Keys whose values differ between `self` and `other`.
    #[must_use]
    pub fn changed_keys(&self, other: &Self) -> Vec<SettingKey> {
        SettingKey::ALL
            .into_iter()
            .filter(|key| match key {
                SettingKey::ServerPath => self.path != other.path,
                SettingKey::ServerArgs => self.args != other.args,
                SettingKey::MasterFile => self.master_file != other.master_file,
                SettingKey::NamespacePaths => self.namespace_paths != other.namespace_paths,
            })
            .collect()
    }
}

/// How to launch the language server.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// The command to execute (e.g., "jasmin-lsp")
    pub path: String,

    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,
}

impl LaunchConfig {
    /// Load the launch configuration.
    ///
    /// Later layers win: built-in defaults, the user config file, an explicit
    /// file, the workspace settings, then `JASMIN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be parsed or the merged
    /// result does not deserialize.
    pub fn load(explicit_file: Option<PathBuf>, workspace: &Settings) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Start with defaults
        builder = builder
            .set_default("path", DEFAULT_SERVER_PATH)?
            .set_default("args", Vec::<String>::new())?;

        // 2. Load from user config directory (~/.config/jasmin-bridge/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("jasmin-bridge").join("config.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // 3. Load from explicit file if provided
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Workspace settings override user-level files
        let overrides = serde_json::json!({
            "path": workspace.path,
            "args": workspace.args,
        });
        let overrides = strip_nulls(overrides);
        builder = builder.add_source(config::File::from_str(
            &overrides.to_string(),
            config::FileFormat::Json,
        ));

        // 5. Load from environment variables (JASMIN_PATH, JASMIN_ARGS)
        builder = builder.add_source(
            config::Environment::with_prefix("JASMIN")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("args"),
        );

        let config = builder
            .build()
            .context("Failed to build launch configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize launch configuration")
    }
}

fn strip_nulls(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect::<serde_json::Map<_, _>>()
            .into(),
        other => other,
    }
}
