use crate::models::media::{EncodingDescriptor, FormatCatalog, FormatEntry};

pub const BEST_VIDEO_LABEL: &str = "Best Quality";
pub const BEST_VIDEO_SELECTOR: &str =
    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/bestvideo+bestaudio/best";
pub const BEST_AUDIO_LABEL: &str = "Best Audio Quality";
pub const BEST_AUDIO_SELECTOR: &str = "bestaudio/best";

const MIN_AUDIO_KBPS: f64 = 128.0;
const SPLIT_STREAM_MIN_HEIGHT: u32 = 1080;

/// Standard resolution ceilings, ascending.
const QUALITY_LADDER: &[(u32, &str)] = &[
    (240, "240p"),
    (360, "360p"),
    (480, "480p"),
    (720, "720p"),
    (1080, "1080p"),
    (1440, "2K"),
    (2160, "4K"),
    (4320, "8K"),
];

pub fn organize(descriptors: &[EncodingDescriptor]) -> FormatCatalog {
    let mut heights: Vec<u32> = Vec::new();
    let mut bitrates: Vec<(f64, &str)> = Vec::new();

    for d in descriptors {
        if d.format_id.is_empty() {
            continue;
        }
        if d.has_video() {
            if let Some(h) = d.height.filter(|h| *h > 0) {
                heights.push(h);
            }
        } else if d.has_audio() {
            if let Some(abr) = d.abr.filter(|a| *a >= MIN_AUDIO_KBPS) {
                bitrates.push((abr, d.format_id.as_str()));
            }
        }
    }

    FormatCatalog {
        combined: video_tiers(heights),
        audio: audio_tiers(bitrates),
    }
}

fn video_tiers(mut heights: Vec<u32>) -> Vec<FormatEntry> {
    let mut entries = vec![FormatEntry {
        label: BEST_VIDEO_LABEL.to_string(),
        selector: BEST_VIDEO_SELECTOR.to_string(),
        actual_height: None,
        bitrate_kbps: None,
        note: Some("Highest quality with audio and video merged".to_string()),
    }];

    for &(ceiling, label) in QUALITY_LADDER {
        let best = heights.iter().copied().filter(|h| *h <= ceiling).max();
        if let Some(h) = best {
            entries.push(FormatEntry {
                label: label.to_string(),
                selector: height_selector(h),
                actual_height: Some(h),
                bitrate_kbps: None,
                note: None,
            });
        }
        heights.retain(|h| *h > ceiling);
    }

    entries
}

fn height_selector(h: u32) -> String {
    if h >= SPLIT_STREAM_MIN_HEIGHT {
        format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}]"
        )
    } else {
        format!("best[height<={h}][ext=mp4]/bestvideo[height<={h}]+bestaudio/best[height<={h}]")
    }
}

fn audio_tiers(mut bitrates: Vec<(f64, &str)>) -> Vec<FormatEntry> {
    bitrates.sort_by(|a, b| b.0.total_cmp(&a.0));
    bitrates.dedup_by(|a, b| a.0 == b.0);

    let mut entries = vec![FormatEntry {
        label: BEST_AUDIO_LABEL.to_string(),
        selector: BEST_AUDIO_SELECTOR.to_string(),
        actual_height: None,
        bitrate_kbps: None,
        note: Some("Highest quality audio".to_string()),
    }];

    for (abr, format_id) in bitrates {
        let label = format!("{}kbps", abr as i64);
        if entries.iter().any(|e| e.label == label) {
            continue;
        }
        entries.push(FormatEntry {
            label,
            selector: format_id.to_string(),
            actual_height: None,
            bitrate_kbps: Some(abr),
            note: None,
        });
    }

    entries
}
