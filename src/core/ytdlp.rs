use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{anyhow, bail};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use crate::backends::traits::{BackendProgress, Postprocess, RetrievalRequest};
use tubegrab_core::fs_paths::AppPaths;

const PROGRESS_PREFIX: &str = "tubegrab-progress:";

static POSTPROCESSOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(Merger|ExtractAudio|Fixup\w+|VideoRemuxer|VideoConvertor|Metadata)\]\s*(.*)$")
        .unwrap()
});

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp(paths: &dyn AppPaths) -> Option<PathBuf> {
    if crate::core::dependencies::responds_to_version(Path::new(bin_name())).await {
        return Some(PathBuf::from(bin_name()));
    }

    let managed = managed_ytdlp_path(paths);
    if managed.exists() {
        return Some(managed);
    }

    None
}

fn managed_ytdlp_path(paths: &dyn AppPaths) -> PathBuf {
    paths.managed_bin_dir().join(bin_name())
}

pub async fn get_video_info(ytdlp: &Path, url: &str) -> anyhow::Result<serde_json::Value> {
    let args = extraction_args(url);
    tracing::debug!("[yt-dlp] {} {}", ytdlp.display(), args.join(" "));

    let output = crate::core::process::command(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("Failed to run yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{}", summarize_stderr(&stderr, output.status.code()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))?;

    Ok(json)
}

fn extraction_args(url: &str) -> Vec<String> {
    vec![
        "--dump-single-json".into(),
        "--simulate".into(),
        "--no-warnings".into(),
        "--no-playlist".into(),
        "--".into(),
        url.into(),
    ]
}

pub fn retrieval_args(request: &RetrievalRequest) -> Vec<String> {
    let mut args = vec!["-f".to_string(), request.selector.clone()];

    if let Some(container) = &request.merge_container {
        args.push("--merge-output-format".into());
        args.push(container.clone());
    }

    if !request.format_sort.is_empty() {
        args.push("-S".into());
        args.push(request.format_sort.join(","));
    }

    match &request.postprocess {
        Postprocess::None => {}
        Postprocess::ExtractToContainer { codec } => {
            args.extend(["-x".into(), "--audio-format".into(), codec.clone()]);
        }
        Postprocess::EncodeLossy { codec, quality } => {
            args.extend([
                "-x".into(),
                "--audio-format".into(),
                codec.clone(),
                "--audio-quality".into(),
                quality.to_string(),
            ]);
        }
    }

    if let Some(ffmpeg) = &request.transcoder {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.to_string_lossy().to_string());
    }

    args.extend([
        "--no-playlist".into(),
        "--newline".into(),
        "--no-mtime".into(),
        "--progress-template".into(),
        format!(
            "download:{}%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s",
            PROGRESS_PREFIX
        ),
        "-o".into(),
        request.output_template.clone(),
        "--".into(),
        request.url.clone(),
    ]);

    args
}

pub async fn download(
    ytdlp: &Path,
    request: &RetrievalRequest,
    progress: mpsc::UnboundedSender<BackendProgress>,
) -> anyhow::Result<()> {
    let args = retrieval_args(request);
    tracing::debug!("[yt-dlp] {} {}", ytdlp.display(), args.join(" "));

    let mut child = crate::core::process::command(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to start yt-dlp: {}", e))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| anyhow!("No stderr"))?;

    let line_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(event) = parse_output_line(&line) {
                let _ = progress.send(event);
            }
        }
    });

    let stderr_reader = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let status = child
        .wait()
        .await
        .map_err(|e| anyhow!("yt-dlp process failed: {}", e))?;

    let _ = line_reader.await;
    let stderr_text = stderr_reader.await.unwrap_or_default();

    if !status.success() {
        bail!("{}", summarize_stderr(&stderr_text, status.code()));
    }

    Ok(())
}

/// Maps one stdout line to a progress event. Lines that carry no progress information yield `None`.
pub fn parse_output_line(line: &str) -> Option<BackendProgress> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return parse_progress_fields(rest);
    }
    parse_postprocessor_line(line)
}

fn parse_progress_fields(rest: &str) -> Option<BackendProgress> {
    let fields: Vec<&str> = rest.split('|').collect();
    if fields.len() < 7 {
        return None;
    }

    match fields[0] {
        "downloading" => Some(BackendProgress::Downloading {
            downloaded_bytes: parse_bytes(fields[1]),
            total_bytes: parse_bytes(fields[2]),
            total_bytes_estimate: parse_bytes(fields[3]),
            percent_text: fields[4].trim().to_string(),
            speed_text: fields[5].trim().to_string(),
            eta_text: fields[6].trim().to_string(),
        }),
        "finished" => Some(BackendProgress::Finished),
        "error" => Some(BackendProgress::Error("Download failed".to_string())),
        _ => None,
    }
}

fn parse_bytes(field: &str) -> Option<u64> {
    let value = field.trim().parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value as u64)
    } else {
        None
    }
}

fn parse_postprocessor_line(line: &str) -> Option<BackendProgress> {
    let caps = POSTPROCESSOR_RE.captures(line)?;
    let note = match &caps[1] {
        "Merger" => "Merging video and audio".to_string(),
        "ExtractAudio" => "Extracting audio".to_string(),
        "VideoRemuxer" | "VideoConvertor" => "Converting video".to_string(),
        "Metadata" => "Writing metadata".to_string(),
        _ => "Fixing container".to_string(),
    };
    Some(BackendProgress::Postprocessing(Some(note)))
}

/// Reduces yt-dlp's stderr to the most relevant error line.
pub fn summarize_stderr(stderr: &str, code: Option<i32>) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(err) = lines.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return err.trim_start_matches("ERROR:").trim().to_string();
    }

    match (lines.last(), code) {
        (Some(last), _) => last.to_string(),
        (None, Some(c)) => format!("yt-dlp exited with code {}", c),
        (None, None) => "yt-dlp was terminated".to_string(),
    }
}
