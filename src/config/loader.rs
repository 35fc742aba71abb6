// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{GraphConfig, RawGraphConfig};
use crate::errors::Result;

/// File name of the graph configuration inside the root directory.
pub const CONFIG_FILE_NAME: &str = "taskgraph.toml";

/// Load a configuration file from a given path and return the raw
/// `RawGraphConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawGraphConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` default functions).
/// - Checks for:
///   - unknown or self-referencing `kind-dependencies`,
///   - cycles among kinds,
///   - sane `[taskgraph]` limits.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphConfig> {
    let raw_config = load_from_path(&path)?;
    let config = GraphConfig::try_from(raw_config)?;
    Ok(config)
}

/// Path of the graph configuration inside `root`.
pub fn config_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(CONFIG_FILE_NAME)
}
