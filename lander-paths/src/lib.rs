//! XDG Base Directory paths for lander.
//!
//! The CLI and file-backed attribution storage both resolve their
//! locations here so a single `XDG_*` override moves everything.

use std::path::PathBuf;

const APP_DIR: &str = "lander";

/// File name of the durable key/value storage inside [`data_dir`].
pub const STORAGE_FILE: &str = "storage.json";

/// Get the lander config directory.
///
/// Returns `$XDG_CONFIG_HOME/lander` if set, otherwise `~/.config/lander`.
///
/// # Examples
///
/// ```
/// use lander_paths::config_dir;
///
/// let config = config_dir();
/// let user_config = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config").join(APP_DIR)
    } else {
        PathBuf::from(".config").join(APP_DIR)
    }
}

/// Get the lander data directory.
///
/// Returns `$XDG_DATA_HOME/lander` if set, otherwise `~/.local/share/lander`.
/// Persisted attribution lives here.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share").join(APP_DIR)
    } else {
        PathBuf::from(".local/share").join(APP_DIR)
    }
}

/// Default location of the durable storage file.
pub fn storage_file() -> PathBuf {
    data_dir().join(STORAGE_FILE)
}
