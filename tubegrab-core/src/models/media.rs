use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unit of work accepted by the engine queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Task {
    FetchDetails { url: String },
    Download(DownloadRequest),
}

impl Task {
    pub fn fetch_details(url: impl Into<String>) -> Self {
        Task::FetchDetails { url: url.into() }
    }

    pub fn url(&self) -> &str {
        match self {
            Task::FetchDetails { url } => url,
            Task::Download(req) => &req.url,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Task::FetchDetails { .. } => "fetch_details",
            Task::Download(_) => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub output_kind: OutputKind,
    pub format_selector: String,
    pub destination_dir: PathBuf,
    pub display_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Video and audio merged into a single mp4 container.
    Video,
    /// Audio repackaged losslessly into an m4a container.
    AudioContainer,
    /// Audio re-encoded to mp3, always from the best audio stream.
    UniversalAudio,
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Video => "mp4",
            OutputKind::AudioContainer => "m4a",
            OutputKind::UniversalAudio => "mp3",
        }
    }

    pub fn needs_transcoder(&self) -> bool {
        matches!(self, OutputKind::UniversalAudio)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub uploader: Option<String>,
    pub formats: FormatCatalog,
}

/// User-facing encodings grouped by purpose, best entry first in each list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatCatalog {
    pub combined: Vec<FormatEntry>,
    pub audio: Vec<FormatEntry>,
}

impl FormatCatalog {
    pub fn entries_for(&self, kind: OutputKind) -> &[FormatEntry] {
        match kind {
            OutputKind::Video => &self.combined,
            OutputKind::AudioContainer | OutputKind::UniversalAudio => &self.audio,
        }
    }

    /// Resolves a quality label to its entry. Universal audio always uses the best audio entry.
    pub fn find(&self, kind: OutputKind, label: &str) -> Option<&FormatEntry> {
        let entries = self.entries_for(kind);
        if kind == OutputKind::UniversalAudio {
            return entries.first();
        }
        entries.iter().find(|e| e.label.eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub label: String,
    pub selector: String,
    pub actual_height: Option<u32>,
    pub bitrate_kbps: Option<f64>,
    pub note: Option<String>,
}

/// One raw encoding as reported by the extraction backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingDescriptor {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub abr: Option<f64>,
}

impl EncodingDescriptor {
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.map(|c| !c.is_empty() && c != "none").unwrap_or(false)
}
