use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Postprocess {
    None,
    /// Lossless audio extraction into the given container codec.
    ExtractToContainer { codec: String },
    /// Lossy re-encode; quality follows the backend's scale, 0 being best.
    EncodeLossy { codec: String, quality: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub url: String,
    pub selector: String,
    pub merge_container: Option<String>,
    pub format_sort: Vec<String>,
    pub output_template: String,
    pub postprocess: Postprocess,
    pub transcoder: Option<PathBuf>,
}

/// Raw progress reported by a retrieval backend while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendProgress {
    Downloading {
        downloaded_bytes: Option<u64>,
        total_bytes: Option<u64>,
        total_bytes_estimate: Option<u64>,
        percent_text: String,
        speed_text: String,
        eta_text: String,
    },
    Finished,
    Postprocessing(Option<String>),
    Error(String),
}

#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn extract_info(&self, url: &str) -> anyhow::Result<serde_json::Value>;
}

#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
    ) -> anyhow::Result<()>;
}
