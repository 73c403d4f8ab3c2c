use std::path::Path;

use anyhow::Context;

use crate::models::settings::{default_download_path, Preferences, DOWNLOAD_PATH_KEY};

/// Reads preferences from `path`. A missing or corrupt file, or a saved folder that no longer exists,
/// falls back to the user's Downloads folder.
pub fn load_preferences(path: &Path) -> Preferences {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Preferences::default(),
    };

    let prefs = match serde_json::from_str::<Preferences>(&raw) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
            return Preferences::default();
        }
    };

    if !prefs.download_path.is_dir() {
        tracing::warn!(
            "Saved download folder {} no longer exists",
            prefs.download_path.display()
        );
        return Preferences {
            download_path: default_download_path(),
        };
    }

    prefs
}

/// Stores the download folder, keeping any other keys already present in the file.
pub fn save_download_path(path: &Path, dir: &Path) -> anyhow::Result<()> {
    let mut doc = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| serde_json::json!({}));

    if let Some(map) = doc.as_object_mut() {
        map.insert(
            DOWNLOAD_PATH_KEY.to_string(),
            serde_json::Value::String(dir.to_string_lossy().to_string()),
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&doc)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
