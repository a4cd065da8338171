//! Configuration loading and catalog database resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Catalog database resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
///
/// The resolved location is normalized into a sqlite connection URL.
pub fn resolve_database_url(cli_arg: Option<&str>, env_var_name: &str) -> Result<String> {
    // Priority 1: Command-line argument
    if let Some(location) = cli_arg {
        return Ok(database_url_from(location));
    }

    // Priority 2: Environment variable
    if let Ok(location) = std::env::var(env_var_name) {
        return Ok(database_url_from(&location));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = load_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(location) = config.get("database").and_then(|v| v.as_str()) {
                    return Ok(database_url_from(location));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    let default_path = default_database_path();
    if let Some(parent) = default_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(database_url_from(&default_path.to_string_lossy()))
}

/// Normalizes a database location into a sqlite connection URL
///
/// Already-formed sqlite URLs (including `sqlite::memory:`) pass through
/// unchanged; filesystem paths become read-write-create URLs.
pub fn database_url_from(location: &str) -> String {
    if location.starts_with("sqlite:") {
        location.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", location)
    }
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let config_path = if cfg!(target_os = "linux") {
        // Try ~/.config/accloner/config.toml first, then /etc/accloner/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("accloner").join("config.toml"));
        let system_config = PathBuf::from("/etc/accloner/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    } else {
        dirs::config_dir()
            .map(|d| d.join("accloner").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
    };

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_path
        )))
    }
}

/// Get OS-dependent default catalog database path
fn default_database_path() -> PathBuf {
    let data_dir = if cfg!(target_os = "macos") {
        // ~/Library/Application Support/accloner
        dirs::data_dir()
            .map(|d| d.join("accloner"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/accloner"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\accloner
        dirs::data_local_dir()
            .map(|d| d.join("accloner"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\accloner"))
    } else {
        // ~/.local/share/accloner (or /var/lib/accloner for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("accloner"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/accloner"))
    };

    data_dir.join("catalog.db")
}
