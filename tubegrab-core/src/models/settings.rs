use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DOWNLOAD_PATH_KEY: &str = "download_path";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
}

pub fn default_download_path() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_uses_default_path() {
        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs.download_path, default_download_path());
    }

    #[test]
    fn serializes_with_download_path_key() {
        let prefs = Preferences {
            download_path: PathBuf::from("/tmp/media"),
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json[DOWNLOAD_PATH_KEY], "/tmp/media");
    }
}
