//! XDG Base Directory paths for kiln.
//!
//! | Purpose | XDG Variable | Default | kiln Path |
//! |---------|--------------|---------|-----------|
//! | Workspace cache | `$XDG_DATA_HOME` | `~/.local/share` | `$XDG_DATA_HOME/kiln/store/*.json` |
//! | Config | `$XDG_CONFIG_HOME` | `~/.config` | `$XDG_CONFIG_HOME/kiln/config.toml` |
//! | REPL history | `$XDG_DATA_HOME` | `~/.local/share` | `$XDG_DATA_HOME/kiln/history.txt` |

use std::path::PathBuf;

use directories::BaseDirs;

/// Get the data directory for persistent state.
///
/// Uses `$XDG_DATA_HOME/kiln` or falls back to `~/.local/share/kiln`.
pub fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".local").join("share"))
        .join("kiln")
}

/// Get the config directory.
///
/// Uses `$XDG_CONFIG_HOME/kiln` or falls back to `~/.config/kiln`.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".config"))
        .join("kiln")
}

/// Default config file location.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory backing the default [`FileStore`](crate::FileStore).
pub fn store_dir() -> PathBuf {
    data_dir().join("store")
}

/// REPL line history.
pub fn history_file() -> PathBuf {
    data_dir().join("history.txt")
}

fn home_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
