use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tokio::sync::mpsc;

use super::AppContext;
use crate::core::engine::Engine;
use crate::core::events::{ChannelEmitter, EngineEvent, ProgressEvent};
use crate::core::thumbnail;
use crate::models::media::{DownloadRequest, FormatEntry, OutputKind, Task, VideoInfo};
use crate::storage::config;

pub struct GetOptions {
    pub kind: OutputKind,
    pub quality: Option<String>,
    pub output: Option<PathBuf>,
    pub thumbnail: bool,
}

pub async fn info(ctx: &AppContext, url: &str) -> anyhow::Result<()> {
    let (engine, mut events) = start_engine(ctx);
    engine.enqueue(Task::fetch_details(url))?;
    let info = await_details(&mut events).await;
    engine.close().await;
    let info = info?;

    println!("{}", info.title);
    if let Some(uploader) = &info.uploader {
        println!("by {}", uploader);
    }
    if let Some(secs) = info.duration_seconds {
        println!("duration {}", format_duration(secs));
    }
    println!();
    println!("Video:");
    for entry in &info.formats.combined {
        println!("  {}", describe(entry));
    }
    println!("Audio:");
    for entry in &info.formats.audio {
        println!("  {}", describe(entry));
    }
    Ok(())
}

pub async fn get(ctx: &AppContext, url: &str, opts: GetOptions) -> anyhow::Result<()> {
    let destination_dir = match opts.output {
        Some(dir) => dir,
        None => config::load_preferences(&ctx.paths.preferences_file()).download_path,
    };

    let (engine, mut events) = start_engine(ctx);
    engine.enqueue(Task::fetch_details(url))?;

    let info = match await_details(&mut events).await {
        Ok(info) => info,
        Err(e) => {
            engine.close().await;
            return Err(e);
        }
    };

    let entry = match pick_entry(&info, opts.kind, opts.quality.as_deref()) {
        Ok(entry) => entry.clone(),
        Err(e) => {
            engine.close().await;
            return Err(e);
        }
    };

    let thumb = match (&info.thumbnail_url, opts.thumbnail) {
        (Some(thumb_url), true) => {
            Some(thumbnail::spawn_fetch(thumbnail::client()?, thumb_url.clone()))
        }
        _ => None,
    };

    tracing::info!("downloading '{}' as {} ({})", info.title, entry.label, opts.kind.extension());
    engine.enqueue(Task::Download(DownloadRequest {
        url: url.to_string(),
        output_kind: opts.kind,
        format_selector: entry.selector.clone(),
        destination_dir: destination_dir.clone(),
        display_title: info.title.clone(),
    }))?;

    let result = await_download(&mut events).await;
    engine.close().await;

    if let Some(handle) = thumb {
        match handle.await {
            Ok(Ok(bytes)) => {
                let url = info.thumbnail_url.as_deref().unwrap_or_default();
                match thumbnail::save(&bytes, &destination_dir, &info.title, url).await {
                    Ok(path) => println!("Thumbnail saved to {}", path.display()),
                    Err(e) => tracing::warn!("could not save thumbnail: {:#}", e),
                }
            }
            Ok(Err(e)) => tracing::warn!("thumbnail fetch failed: {:#}", e),
            Err(e) => tracing::warn!("thumbnail task failed: {}", e),
        }
    }

    let title = result?;
    println!("Saved '{}' to {}", title, destination_dir.display());
    Ok(())
}

fn start_engine(ctx: &AppContext) -> (Engine, mpsc::UnboundedReceiver<EngineEvent>) {
    let (emitter, rx) = ChannelEmitter::new();
    let engine = Engine::with_ytdlp(ctx.config.clone(), Arc::new(emitter));
    (engine, rx)
}

async fn await_details(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> anyhow::Result<VideoInfo> {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::VideoDetailsSuccess(info) => return Ok(info),
            EngineEvent::VideoDetailsError { message } => bail!("Could not read video details: {}", message),
            EngineEvent::Download(_) => {}
        }
    }
    Err(anyhow!("Engine stopped before reporting details"))
}

async fn await_download(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> anyhow::Result<String> {
    let mut last_percent = -1i64;
    while let Some(event) = events.recv().await {
        let EngineEvent::Download(progress) = event else {
            continue;
        };
        match progress {
            ProgressEvent::Downloading {
                fraction,
                speed_text,
                eta_text,
                ..
            } => {
                let percent = (fraction * 100.0).floor() as i64;
                if percent != last_percent {
                    last_percent = percent;
                    println!("{:>3}%  {}  ETA {}", percent, speed_text, eta_text);
                }
            }
            ProgressEvent::Processing { note } => {
                println!("{}", note.as_deref().unwrap_or("Processing..."));
            }
            ProgressEvent::Completed { title } => return Ok(title),
            ProgressEvent::Failed { message } => bail!("Download failed: {}", message),
        }
    }
    Err(anyhow!("Engine stopped before the download finished"))
}

fn pick_entry<'a>(
    info: &'a VideoInfo,
    kind: OutputKind,
    quality: Option<&str>,
) -> anyhow::Result<&'a FormatEntry> {
    let entries = info.formats.entries_for(kind);
    let found = match quality {
        Some(label) => info.formats.find(kind, label),
        None => entries.first(),
    };
    found.ok_or_else(|| {
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        anyhow!(
            "Quality '{}' is not available. Choose one of: {}",
            quality.unwrap_or_default(),
            labels.join(", ")
        )
    })
}

fn describe(entry: &FormatEntry) -> String {
    let mut line = entry.label.clone();
    if let Some(h) = entry.actual_height {
        line.push_str(&format!(" ({}p source)", h));
    }
    if let Some(note) = &entry.note {
        line.push_str(&format!(" - {}", note));
    }
    line
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
