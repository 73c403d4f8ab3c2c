use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{BackendProgress, ExtractionBackend, RetrievalBackend, RetrievalRequest};
use crate::core::ytdlp;

/// Both backend roles served by a single yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    binary: PathBuf,
}

impl YtDlpBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ExtractionBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract_info(&self, url: &str) -> anyhow::Result<serde_json::Value> {
        ytdlp::get_video_info(&self.binary, url).await
    }
}

#[async_trait]
impl RetrievalBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
    ) -> anyhow::Result<()> {
        ytdlp::download(&self.binary, request, progress).await
    }
}
