//! Configuration file discovery and loading
//!
//! Resolution priority for the config file path:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`~/.config/singscore/<module>.toml`)
//! 4. System config (`/etc/singscore/<module>.toml`, Linux only)
//!
//! A missing config file is not an error: callers fall back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resolve the config file path for a module
///
/// Returns `None` when no candidate exists on disk. An explicit path (CLI or ENV)
/// is returned even if it does not exist so the caller can report it.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    module_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Per-user config directory
    let file_name = format!("{}.toml", module_name);
    if let Some(path) = dirs::config_dir().map(|d| d.join("singscore").join(&file_name)) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System-wide config
    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/singscore").join(&file_name);
        if system.exists() {
            return Some(system);
        }
    }

    None
}

/// Parse a TOML config file into `T`
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a config file, degrading to `T::default()` when it is absent or unreadable
///
/// A missing file logs at info level; a malformed file logs a warning. Neither
/// prevents startup.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> T {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return T::default();
    };

    if !path.exists() {
        warn!("Config file {} does not exist, using compiled defaults", path.display());
        return T::default();
    }

    match load_toml_file(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using compiled defaults", e);
            T::default()
        }
    }
}

/// Read an environment variable, treating blank values as unset
pub fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Override `target` with the environment variable if it is set
pub fn apply_env_override(target: &mut Option<String>, env_var_name: &str) {
    if let Some(value) = non_empty_env(env_var_name) {
        debug!("{} overrides config file value", env_var_name);
        *target = Some(value);
    }
}

/// Check whether a credential can be used against a live service
///
/// Blank values and placeholder values (anything containing "test",
/// case-insensitive) are rejected.
pub fn is_usable_credential(value: Option<&str>) -> bool {
    match value {
        Some(v) => {
            let trimmed = v.trim();
            !trimmed.is_empty() && !trimmed.to_ascii_lowercase().contains("test")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_credential_rejects_placeholders() {
        assert!(!is_usable_credential(None));
        assert!(!is_usable_credential(Some("")));
        assert!(!is_usable_credential(Some("   ")));
        assert!(!is_usable_credential(Some("test_key")));
        assert!(!is_usable_credential(Some("MY-TEST-SECRET")));
        assert!(is_usable_credential(Some("LTAI5tRealKey")));
    }

    #[test]
    fn test_cli_path_wins() {
        let path = PathBuf::from("/nonexistent/singscore.toml");
        let resolved = resolve_config_path(Some(&path), "SINGSCORE_UNUSED_CONFIG_VAR", "singscore-ai");
        assert_eq!(resolved, Some(path));
    }
}
