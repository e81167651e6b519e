//! Configuration discovery and loading
//!
//! The configuration file is looked up using the following precedence:
//! 1. An explicit path (the `--config` flag)
//! 2. `EMISSARY_CONFIG` environment variable
//! 3. `./emissary.config.ron` (current working directory)
//! 4. `/etc/emissary/emissary.config.ron` (system-wide config)
//!
//! When none of these exist the built-in demo configuration is used.

use std::path::{Path, PathBuf};

use anyhow::Context;
use emissary_common::internal;

use crate::controller::Emissary;

pub const CONFIG_ENV: &str = "EMISSARY_CONFIG";

fn default_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("./emissary.config.ron"),
        PathBuf::from("/etc/emissary/emissary.config.ron"),
    ]
}

/// Find the configuration file to load, if any.
///
/// # Errors
///
/// An explicit path or `EMISSARY_CONFIG` that points at a missing file is an
/// error rather than a silent fallback.
pub fn find_config_file(explicit: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    find_config_file_in(explicit, std::env::var(CONFIG_ENV).ok(), &default_paths())
}

pub(crate) fn find_config_file_in(
    explicit: Option<PathBuf>,
    env_path: Option<String>,
    defaults: &[PathBuf],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    if let Some(env_path) = env_path {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(defaults.iter().find(|path| path.exists()).cloned())
}

/// Parse a RON configuration file.
///
/// # Errors
///
/// If the file cannot be read or is not a valid configuration.
pub fn load(path: &Path) -> anyhow::Result<Emissary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let emissary = ron::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    internal!(level = INFO, "Loaded configuration from {}", path.display());
    Ok(emissary)
}

/// Locate and load the configuration, falling back to the demo defaults.
///
/// # Errors
///
/// See [`find_config_file`] and [`load`].
pub fn resolve(explicit: Option<PathBuf>) -> anyhow::Result<Emissary> {
    match find_config_file(explicit)? {
        Some(path) => load(&path),
        None => {
            internal!(
                level = INFO,
                "No configuration file found, using built-in defaults"
            );
            Ok(Emissary::default())
        }
    }
}
