// Linkshelf platform paths
//
// Config: ~/.config/linkshelf, ~/Library/Application Support/Linkshelf, %APPDATA%/Linkshelf
// Data:   ~/.local/share/linkshelf, ~/Library/Application Support/Linkshelf, %APPDATA%/Linkshelf

use std::env;
use std::path::PathBuf;

#[cfg_attr(target_os = "windows", allow(dead_code))]
fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Returns the platform-specific configuration directory for linkshelf.
///
/// On Linux `$XDG_CONFIG_HOME/linkshelf` wins over `~/.config/linkshelf`.
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join("Linkshelf")
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA")
            .unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming"));
        PathBuf::from(appdata).join("Linkshelf")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("linkshelf"),
            Err(_) => home_dir().join(".config").join("linkshelf"),
        }
    }
}

/// Returns the platform-specific data directory for linkshelf.
///
/// On Linux `$XDG_DATA_HOME/linkshelf` wins over `~/.local/share/linkshelf`.
pub fn get_data_dir() -> PathBuf {
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    {
        get_config_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var("XDG_DATA_HOME") {
            Ok(xdg) => PathBuf::from(xdg).join("linkshelf"),
            Err(_) => home_dir().join(".local").join("share").join("linkshelf"),
        }
    }
}
