//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\pomodoro-radio\
//!   macOS:   ~/Library/Application Support/pomodoro-radio/
//!   Linux:   ~/.config/pomodoro-radio/
//!
//! Data dir (sound assets):
//!   Windows: %LOCALAPPDATA%\pomodoro-radio\
//!   macOS:   ~/Library/Application Support/pomodoro-radio/
//!   Linux:   ~/.local/share/pomodoro-radio/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory searched for the rain / vinyl / chime samples when the
    /// configured asset paths are relative.
    pub assets_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "pomodoro-radio";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let assets_dir = data_dir.join("assets");

        Self {
            config_dir,
            settings_file,
            assets_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.assets_dir.ends_with("assets"));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }
}
