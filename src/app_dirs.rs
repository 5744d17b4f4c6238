use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/tock`, or the platform data dir without `HOME`.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("tock"))
        } else {
            ProjectDirs::from("", "", "tock").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("tock.db"))
    }

    pub fn history_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.csv"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("tock.log"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tock").map(|pd| pd.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_the_state_dir() {
        if let Some(dir) = AppDirs::state_dir() {
            assert_eq!(AppDirs::db_path().unwrap(), dir.join("tock.db"));
            assert_eq!(AppDirs::history_path().unwrap(), dir.join("history.csv"));
            assert_eq!(AppDirs::log_path().unwrap(), dir.join("tock.log"));
        }
    }
}
