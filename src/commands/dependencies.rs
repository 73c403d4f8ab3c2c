use super::AppContext;
use crate::core::dependencies;

pub async fn report(ctx: &AppContext) -> anyhow::Result<()> {
    let statuses = dependencies::check_dependencies(&ctx.config.ytdlp, &ctx.config.transcoder).await;

    for status in &statuses {
        match (&status.version, status.installed) {
            (Some(v), true) => println!("{:<8} {}", status.name, v),
            (None, true) => println!("{:<8} installed", status.name),
            _ => println!("{:<8} missing", status.name),
        }
        if let Some(path) = &status.path {
            tracing::debug!("{} resolved to {}", status.name, path.display());
        }
    }

    if statuses.iter().all(|s| s.installed) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Some dependencies are missing"))
    }
}
