use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "speakwell";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.config_dir().join("config.json"))
    }

    pub fn log_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join("speakwell.log"))
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().join("speakwell.log"))
        }
    }

    /// Reports land in `./results` unless configured otherwise.
    pub fn default_results_dir() -> PathBuf {
        PathBuf::from("results")
    }
}
