use std::path::Path;

use anyhow::{bail, Context};

use super::AppContext;
use crate::storage::config;

pub fn set_download_dir(ctx: &AppContext, dir: &Path) -> anyhow::Result<()> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Cannot resolve current directory")?
            .join(dir)
    };

    if !dir.is_dir() {
        bail!("{} is not an existing folder", dir.display());
    }

    config::save_download_path(&ctx.paths.preferences_file(), &dir)?;
    tracing::info!("download folder set to {}", dir.display());
    println!("Download folder: {}", dir.display());
    Ok(())
}

pub fn show_download_dir(ctx: &AppContext) -> anyhow::Result<()> {
    let prefs = config::load_preferences(&ctx.paths.preferences_file());
    println!("{}", prefs.download_path.display());
    Ok(())
}
