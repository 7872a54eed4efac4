//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/nestset/nestset.toml`
//! 3. Local config: `<dir>/.nestset.toml` (usually the working directory)
//! 4. Environment variables: `NESTSET_*` prefix, `__` between nested keys

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Storage column names of the node table.
///
/// Only the file store reads these, once, when it opens the forest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnNames {
    pub key: String,
    pub parent: String,
    pub left: String,
    pub right: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            key: "id".into(),
            parent: "parent_id".into(),
            left: "lft".into(),
            right: "rght".into(),
        }
    }
}

/// Unified configuration for nestset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Forest file used by the CLI
    pub store: PathBuf,
    /// Default for child queries when the caller does not say
    pub recursive: bool,
    /// Target positions count the moved node's old slot as already vacated
    pub jstree_positions: bool,
    /// Column names in the forest file
    pub columns: ColumnNames,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: default_store_path(),
            recursive: false,
            jstree_positions: false,
            columns: ColumnNames::default(),
        }
    }
}

/// Default forest file (`<data_dir>/nestset/forest.toml`).
fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "nestset")
        .map(|dirs| dirs.data_dir().join("forest.toml"))
        .unwrap_or_else(|| PathBuf::from("forest.toml"))
}

/// Get the XDG config directory for nestset.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nestset").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("nestset.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".nestset.toml")
}

/// Expand `~`, `$VAR` and `${VAR}` in a path, leaving it unchanged on failure.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.nestset.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("store", defaults.store.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("recursive", defaults.recursive)
            .map_err(config_err)?
            .set_default("jstree_positions", defaults.jstree_positions)
            .map_err(config_err)?
            .set_default("columns.key", defaults.columns.key.clone())
            .map_err(config_err)?
            .set_default("columns.parent", defaults.columns.parent.clone())
            .map_err(config_err)?
            .set_default("columns.left", defaults.columns.left.clone())
            .map_err(config_err)?
            .set_default("columns.right", defaults.columns.right.clone())
            .map_err(config_err)?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                builder = builder.add_source(File::from(local_path).required(true));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("NESTSET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.store = expand_path(&settings.store);
        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# nestset configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/nestset/nestset.toml
#   Local:  ./.nestset.toml
#   Env:    NESTSET_* environment variables (NESTSET_COLUMNS__LEFT=lft)

# Forest file used by the CLI
# store = "~/.local/share/nestset/forest.toml"

# Include grandchildren in `children`/`count` unless -r is given explicitly
# recursive = false

# Count the moved node's own slot as vacated when moving forward (jsTree style)
# jstree_positions = false

[columns]
# key = "id"
# parent = "parent_id"
# left = "lft"
# right = "rght"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_uses_lft_rght_columns() {
        let columns = ColumnNames::default();
        assert_eq!(columns.parent, "parent_id");
        assert_eq!(columns.left, "lft");
        assert_eq!(columns.right, "rght");
    }

    #[test]
    fn given_settings_when_serialized_then_template_keys_match() {
        let toml = Settings::default().to_toml().expect("serialize");
        assert!(toml.contains("jstree_positions = false"));
        assert!(toml.contains("[columns]"));
        let parsed: Settings = toml::from_str(&Settings::template()).expect("template parses");
        assert_eq!(parsed.columns, ColumnNames::default());
    }

    #[test]
    fn given_tilde_in_store_when_expanding_then_uses_home() {
        let home = std::env::var("HOME").expect("HOME should be set");
        let expanded = expand_path(Path::new("~/forest.toml"));
        assert!(expanded.starts_with(&home));
    }
}
