//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (settings + secrets):
//!   Windows: %APPDATA%\sleepy-news\
//!   macOS:   ~/Library/Application Support/sleepy-news/
//!   Linux:   ~/.config/sleepy-news/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `.env`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the per-user `.env` (API keys).
    pub env_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "sleepy-news";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let env_file = config_dir.join(".env");

        Self {
            config_dir,
            settings_file,
            env_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
