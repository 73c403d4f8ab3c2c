use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;

fn bin_name(tool: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

fn version_flag_for(tool: &Path) -> &'static str {
    let stem = tool
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    }
}

/// Runs the tool's trivial version probe. Any spawn error or non-zero exit counts as absent.
pub async fn responds_to_version(path: &Path) -> bool {
    crate::core::process::command(path)
        .arg(version_flag_for(path))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

pub async fn check_version(path: &Path) -> Option<String> {
    let output = crate::core::process::command(path)
        .arg(version_flag_for(path))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("");

    if version_flag_for(path) == "-version" {
        first_line.split_whitespace().nth(2).map(|s| s.to_string())
    } else {
        Some(first_line.trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum TranscoderStatus {
    /// `on_path` is set when the hit is a bare command resolved through PATH rather than a file location.
    Available { path: PathBuf, on_path: bool },
    Missing,
}

impl TranscoderStatus {
    pub fn path(&self) -> Option<&Path> {
        match self {
            TranscoderStatus::Available { path, .. } => Some(path),
            TranscoderStatus::Missing => None,
        }
    }

    /// Location to pass to yt-dlp. `None` for PATH hits.
    pub fn explicit_location(&self) -> Option<&Path> {
        match self {
            TranscoderStatus::Available {
                path,
                on_path: false,
            } => Some(path),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TranscoderStatus::Available { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    on_path: bool,
}

/// Ordered list of places an ffmpeg binary may live. The first one that answers a version probe wins.
#[derive(Debug, Clone)]
pub struct TranscoderLocator {
    candidates: Vec<Candidate>,
}

impl TranscoderLocator {
    /// Bundled directory first, then whatever `ffmpeg` resolves to on PATH.
    pub fn new(bundled_dir: Option<&Path>) -> Self {
        let name = bin_name("ffmpeg");
        let mut candidates = Vec::new();
        if let Some(dir) = bundled_dir {
            candidates.push(Candidate {
                path: dir.join(&name),
                on_path: false,
            });
        }
        candidates.push(Candidate {
            path: PathBuf::from(name),
            on_path: true,
        });
        Self { candidates }
    }

    /// Only the given file locations, no PATH lookup.
    pub fn with_candidates(paths: Vec<PathBuf>) -> Self {
        Self {
            candidates: paths
                .into_iter()
                .map(|path| Candidate {
                    path,
                    on_path: false,
                })
                .collect(),
        }
    }

    /// Puts a user-supplied binary ahead of every other candidate. A bare command name is looked up on PATH.
    pub fn prefer(mut self, path: PathBuf) -> Self {
        let on_path = path
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty());
        self.candidates.insert(0, Candidate { path, on_path });
        self
    }

    #[cfg(test)]
    pub(crate) fn resolved_on_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![Candidate {
                path,
                on_path: true,
            }],
        }
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Path> {
        self.candidates.iter().map(|c| c.path.as_path())
    }

    pub async fn probe(&self) -> TranscoderStatus {
        let started = std::time::Instant::now();
        for candidate in &self.candidates {
            if responds_to_version(&candidate.path).await {
                tracing::debug!(
                    "transcoder found at {} (on_path={}) in {:?}",
                    candidate.path.display(),
                    candidate.on_path,
                    started.elapsed()
                );
                return TranscoderStatus::Available {
                    path: candidate.path.clone(),
                    on_path: candidate.on_path,
                };
            }
        }
        tracing::debug!("no transcoder answered after {:?}", started.elapsed());
        TranscoderStatus::Missing
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    pub name: String,
    pub installed: bool,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

pub async fn check_dependencies(ytdlp: &Path, transcoder: &TranscoderLocator) -> Vec<DependencyStatus> {
    let (ytdlp_version, ffmpeg_status) = tokio::join!(check_version(ytdlp), transcoder.probe());

    let ffmpeg_version = match ffmpeg_status.path() {
        Some(p) => check_version(p).await,
        None => None,
    };

    vec![
        DependencyStatus {
            name: "yt-dlp".into(),
            installed: ytdlp_version.is_some(),
            version: ytdlp_version,
            path: Some(ytdlp.to_path_buf()),
        },
        DependencyStatus {
            name: "FFmpeg".into(),
            installed: ffmpeg_status.is_available(),
            version: ffmpeg_version,
            path: ffmpeg_status.path().map(Path::to_path_buf),
        },
    ]
}
