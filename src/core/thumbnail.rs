use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::task::JoinHandle;

const USER_AGENT: &str = concat!("tubegrab/", env!("CARGO_PKG_VERSION"));

pub fn client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

pub async fn fetch(client: &reqwest::Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Thumbnail request failed for {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!("Thumbnail HTTP {} for {}", response.status(), url));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Fetches the image on its own task, outside the engine queue.
pub fn spawn_fetch(client: reqwest::Client, url: String) -> JoinHandle<anyhow::Result<Vec<u8>>> {
    tokio::spawn(async move {
        let started = std::time::Instant::now();
        let bytes = fetch(&client, &url).await?;
        tracing::debug!(
            "[thumbnail] {} bytes from {} in {:?}",
            bytes.len(),
            url,
            started.elapsed()
        );
        Ok(bytes)
    })
}

pub async fn save(bytes: &[u8], dir: &Path, title: &str, url: &str) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(crate::core::filename::thumbnail_file_name(title, url));
    tokio::fs::write(&target, bytes)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}
