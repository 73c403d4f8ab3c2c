use crate::backends::traits::ExtractionBackend;
use crate::core::events::EngineEvent;
use crate::core::formats;
use crate::models::media::{EncodingDescriptor, VideoInfo};

const UNKNOWN_TITLE: &str = "N/A";

pub async fn fetch_details(backend: &dyn ExtractionBackend, url: &str) -> EngineEvent {
    match backend.extract_info(url).await {
        Ok(json) => {
            let info = build_video_info(&json);
            tracing::info!(
                "[fetcher] '{}' has {} video tiers, {} audio tiers",
                info.title,
                info.formats.combined.len(),
                info.formats.audio.len()
            );
            EngineEvent::VideoDetailsSuccess(info)
        }
        Err(e) => {
            tracing::error!("[fetcher] {} failed for {}: {}", backend.name(), url, e);
            EngineEvent::details_error(e.to_string())
        }
    }
}

pub fn build_video_info(json: &serde_json::Value) -> VideoInfo {
    let title = json
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or(UNKNOWN_TITLE)
        .to_string();

    VideoInfo {
        title,
        thumbnail_url: string_field(json, "thumbnail"),
        duration_seconds: json.get("duration").and_then(|v| v.as_f64()),
        uploader: string_field(json, "uploader"),
        formats: formats::organize(&parse_descriptors(json)),
    }
}

pub fn parse_descriptors(json: &serde_json::Value) -> Vec<EncodingDescriptor> {
    let Some(formats) = json.get("formats").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    formats
        .iter()
        .filter_map(|f| {
            let format_id = f.get("format_id").and_then(|v| v.as_str())?;
            Some(EncodingDescriptor {
                format_id: format_id.to_string(),
                ext: string_field(f, "ext"),
                vcodec: string_field(f, "vcodec"),
                acodec: string_field(f, "acodec"),
                height: f
                    .get("height")
                    .and_then(|v| v.as_u64())
                    .and_then(|h| u32::try_from(h).ok()),
                abr: f.get("abr").and_then(|v| v.as_f64()),
            })
        })
        .collect()
}

fn string_field(json: &serde_json::Value, key: &str) -> Option<String> {
    json.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}
