use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "TUBEGRAB_DATA_DIR";

pub trait AppPaths: Send + Sync {
    fn data_dir(&self) -> PathBuf;
    fn preferences_file(&self) -> PathBuf;
    /// Directory holding binaries shipped alongside the executable.
    fn bundled_bin_dir(&self) -> Option<PathBuf>;

    /// Directory where a user-installed yt-dlp is looked up when none is on PATH.
    fn managed_bin_dir(&self) -> PathBuf {
        self.data_dir().join("bin")
    }
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|d| d.join("tubegrab"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn preferences_file(&self) -> PathBuf {
        self.data_dir().join("preferences.json")
    }

    fn bundled_bin_dir(&self) -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join("ffmpeg").join("bin"))
    }
}
