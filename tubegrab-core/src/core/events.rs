use serde::Serialize;

use crate::models::media::VideoInfo;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    Downloading {
        fraction: f64,
        percent_text: String,
        speed_text: String,
        eta_text: String,
    },
    Processing {
        note: Option<String>,
    },
    Completed {
        title: String,
    },
    Failed {
        message: String,
    },
}

/// Everything the engine reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    VideoDetailsSuccess(VideoInfo),
    VideoDetailsError { message: String },
    Download(ProgressEvent),
}

impl EngineEvent {
    pub fn download_error(message: impl Into<String>) -> Self {
        EngineEvent::Download(ProgressEvent::Failed {
            message: message.into(),
        })
    }

    pub fn details_error(message: impl Into<String>) -> Self {
        EngineEvent::VideoDetailsError {
            message: message.into(),
        }
    }
}

/// The single hop events take from the worker back to the caller's context.
/// Implementations decide where and when the event is handled; the worker never blocks on it.
pub trait EventEmitter: Send + Sync + 'static {
    fn emit(&self, event: EngineEvent);
}
