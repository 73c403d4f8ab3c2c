use std::path::Path;

use tokio::sync::mpsc;

use crate::backends::traits::{BackendProgress, Postprocess, RetrievalBackend, RetrievalRequest};
use crate::core::dependencies::TranscoderLocator;
use crate::core::events::{EngineEvent, EventEmitter, ProgressEvent};
use crate::models::media::{DownloadRequest, OutputKind};

pub const ENCODING_UNAVAILABLE: &str = "Requested format is not available";
pub const FALLBACK_SELECTOR: &str = "best[ext=mp4]/bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";
pub const FALLBACK_NOTE: &str = "Trying fallback format...";
pub const TRANSCODER_MISSING: &str =
    "FFmpeg was not found. It is required to convert audio to MP3.";

const UNIVERSAL_AUDIO_SELECTOR: &str = "bestaudio/best";
const OPEN_EXT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Builds the backend request for one download. `transcoder` is forwarded as the ffmpeg location.
pub fn plan(request: &DownloadRequest, transcoder: Option<&Path>) -> RetrievalRequest {
    let dir = &request.destination_dir;
    let (selector, merge_container, format_sort, template, postprocess) = match request.output_kind
    {
        OutputKind::Video => (
            request.format_selector.clone(),
            Some("mp4".to_string()),
            vec!["res".to_string(), "ext:mp4:m4a".to_string()],
            dir.join(OPEN_EXT_TEMPLATE),
            Postprocess::None,
        ),
        OutputKind::AudioContainer => (
            request.format_selector.clone(),
            None,
            Vec::new(),
            dir.join("%(title)s.m4a"),
            Postprocess::ExtractToContainer {
                codec: "m4a".to_string(),
            },
        ),
        OutputKind::UniversalAudio => (
            UNIVERSAL_AUDIO_SELECTOR.to_string(),
            None,
            Vec::new(),
            dir.join(OPEN_EXT_TEMPLATE),
            Postprocess::EncodeLossy {
                codec: "mp3".to_string(),
                quality: 0,
            },
        ),
    };

    RetrievalRequest {
        url: request.url.clone(),
        selector,
        merge_container,
        format_sort,
        output_template: template.to_string_lossy().to_string(),
        postprocess,
        transcoder: transcoder.map(Path::to_path_buf),
    }
}

/// Turns raw backend progress into caller-facing events. The reported fraction never goes backwards.
/// A backend error status is held back and surfaces as the attempt's error instead of a second terminal event.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    fraction: f64,
    reported_error: Option<String>,
}

impl ProgressTracker {
    pub fn translate(&mut self, progress: BackendProgress) -> Option<ProgressEvent> {
        match progress {
            BackendProgress::Downloading {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
                percent_text,
                speed_text,
                eta_text,
            } => {
                let downloaded = downloaded_bytes?;
                let total = total_bytes.or(total_bytes_estimate).filter(|t| *t > 0)?;
                let fraction = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
                self.fraction = self.fraction.max(fraction);
                Some(ProgressEvent::Downloading {
                    fraction: self.fraction,
                    percent_text,
                    speed_text,
                    eta_text,
                })
            }
            BackendProgress::Finished => Some(ProgressEvent::Processing { note: None }),
            BackendProgress::Postprocessing(note) => Some(ProgressEvent::Processing { note }),
            BackendProgress::Error(message) => {
                self.reported_error = Some(message);
                None
            }
        }
    }

    fn take_error(&mut self) -> Option<String> {
        self.reported_error.take()
    }
}

pub async fn execute(
    backend: &dyn RetrievalBackend,
    transcoder: &TranscoderLocator,
    request: &DownloadRequest,
    emitter: &dyn EventEmitter,
) {
    let status = transcoder.probe().await;
    if !status.is_available() {
        if request.output_kind.needs_transcoder() {
            tracing::error!("[executor] {} for {}", TRANSCODER_MISSING, request.url);
            emitter.emit(EngineEvent::download_error(TRANSCODER_MISSING));
            return;
        }
        tracing::warn!("[executor] ffmpeg not found, merges may fail for {}", request.url);
    }

    if let Err(e) = tokio::fs::create_dir_all(&request.destination_dir).await {
        let message = format!(
            "Could not create folder {}: {}",
            request.destination_dir.display(),
            e
        );
        tracing::error!("[executor] {}", message);
        emitter.emit(EngineEvent::download_error(message));
        return;
    }

    let plan = plan(request, status.explicit_location());
    let mut tracker = ProgressTracker::default();

    let error = match attempt(backend, &plan, &mut tracker, emitter).await {
        Ok(()) => return complete(request, emitter),
        Err(e) => format!("{:#}", e),
    };

    if request.output_kind != OutputKind::Video || !error.contains(ENCODING_UNAVAILABLE) {
        tracing::error!("[executor] download failed for {}: {}", request.url, error);
        emitter.emit(EngineEvent::download_error(error));
        return;
    }

    tracing::info!(
        "[executor] selector '{}' unavailable, retrying with fallback",
        plan.selector
    );
    emitter.emit(EngineEvent::Download(ProgressEvent::Processing {
        note: Some(FALLBACK_NOTE.to_string()),
    }));

    let fallback = RetrievalRequest {
        selector: FALLBACK_SELECTOR.to_string(),
        ..plan
    };

    match attempt(backend, &fallback, &mut tracker, emitter).await {
        Ok(()) => complete(request, emitter),
        Err(e) => {
            tracing::warn!("[executor] fallback failed for {}: {:#}", request.url, e);
            emitter.emit(EngineEvent::download_error(error));
        }
    }
}

fn complete(request: &DownloadRequest, emitter: &dyn EventEmitter) {
    tracing::info!("[executor] completed '{}'", request.display_title);
    emitter.emit(EngineEvent::Download(ProgressEvent::Completed {
        title: request.display_title.clone(),
    }));
}

async fn attempt(
    backend: &dyn RetrievalBackend,
    request: &RetrievalRequest,
    tracker: &mut ProgressTracker,
    emitter: &dyn EventEmitter,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let forward = async {
        while let Some(progress) = rx.recv().await {
            if let Some(event) = tracker.translate(progress) {
                emitter.emit(EngineEvent::Download(event));
            }
        }
    };

    let (result, ()) = tokio::join!(backend.retrieve(request, tx), forward);
    let reported = tracker.take_error();
    match (result, reported) {
        (Ok(()), Some(message)) => Err(anyhow::anyhow!(message)),
        (result, _) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::ChannelEmitter;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    type Script = (Vec<BackendProgress>, Result<(), String>);

    #[derive(Default)]
    struct ScriptedBackend {
        script: Mutex<VecDeque<Script>>,
        calls: Mutex<Vec<RetrievalRequest>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<RetrievalRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RetrievalBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn retrieve(
            &self,
            request: &RetrievalRequest,
            progress: mpsc::UnboundedSender<BackendProgress>,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(request.clone());
            let (events, result) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Vec::new(), Ok(())));
            for event in events {
                progress.send(event).unwrap();
            }
            result.map_err(|e| anyhow!(e))
        }
    }

    fn missing_transcoder(dir: &Path) -> TranscoderLocator {
        TranscoderLocator::with_candidates(vec![dir.join("no-such-ffmpeg")])
    }

    fn download(kind: OutputKind, dir: &Path) -> DownloadRequest {
        DownloadRequest {
            url: "https://example.com/watch?v=abc".into(),
            output_kind: kind,
            format_selector: "best[height<=720][ext=mp4]".into(),
            destination_dir: dir.to_path_buf(),
            display_title: "My Clip".into(),
        }
    }

    fn downloading(done: u64, total: Option<u64>, estimate: Option<u64>) -> BackendProgress {
        BackendProgress::Downloading {
            downloaded_bytes: Some(done),
            total_bytes: total,
            total_bytes_estimate: estimate,
            percent_text: "x%".into(),
            speed_text: "1MiB/s".into(),
            eta_text: "00:01".into(),
        }
    }

    async fn run(
        backend: &ScriptedBackend,
        request: &DownloadRequest,
        locator: &TranscoderLocator,
    ) -> Vec<EngineEvent> {
        let (emitter, mut rx) = ChannelEmitter::new();
        execute(backend, locator, request, &emitter).await;
        drop(emitter);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    fn fractions(events: &[EngineEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Download(ProgressEvent::Downloading { fraction, .. }) => Some(*fraction),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plan_per_output_kind() {
        let dir = PathBuf::from("/media/out");

        let video = plan(&download(OutputKind::Video, &dir), None);
        assert_eq!(video.selector, "best[height<=720][ext=mp4]");
        assert_eq!(video.merge_container.as_deref(), Some("mp4"));
        assert_eq!(video.format_sort, vec!["res", "ext:mp4:m4a"]);
        assert_eq!(video.postprocess, Postprocess::None);
        assert!(video.output_template.ends_with("%(title)s.%(ext)s"));

        let container = plan(&download(OutputKind::AudioContainer, &dir), None);
        assert_eq!(container.selector, "best[height<=720][ext=mp4]");
        assert!(container.output_template.ends_with("%(title)s.m4a"));
        assert_eq!(
            container.postprocess,
            Postprocess::ExtractToContainer { codec: "m4a".into() }
        );

        let ffmpeg = PathBuf::from("/opt/ffmpeg");
        let universal = plan(&download(OutputKind::UniversalAudio, &dir), Some(&ffmpeg));
        assert_eq!(universal.selector, "bestaudio/best");
        assert!(universal.output_template.ends_with("%(title)s.%(ext)s"));
        assert_eq!(
            universal.postprocess,
            Postprocess::EncodeLossy { codec: "mp3".into(), quality: 0 }
        );
        assert_eq!(universal.transcoder, Some(ffmpeg));
    }

    #[test]
    fn tracker_requires_known_sizes() {
        let mut tracker = ProgressTracker::default();
        let unknown = BackendProgress::Downloading {
            downloaded_bytes: None,
            total_bytes: Some(10),
            total_bytes_estimate: None,
            percent_text: String::new(),
            speed_text: String::new(),
            eta_text: String::new(),
        };
        assert_eq!(tracker.translate(unknown), None);
        assert_eq!(tracker.translate(downloading(5, None, None)), None);
        assert_eq!(tracker.translate(downloading(5, Some(0), None)), None);
        match tracker.translate(downloading(5, None, Some(20))) {
            Some(ProgressEvent::Downloading { fraction, .. }) => assert_eq!(fraction, 0.25),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn universal_audio_without_transcoder_never_reaches_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::default();
        let events = run(
            &backend,
            &download(OutputKind::UniversalAudio, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;
        assert_eq!(events, vec![EngineEvent::download_error(TRANSCODER_MISSING)]);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn video_progress_is_monotonic_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![(
            vec![
                downloading(50, Some(100), None),
                downloading(25, Some(100), None),
                downloading(150, Some(100), None),
                BackendProgress::Finished,
                BackendProgress::Postprocessing(Some("Merging video and audio".into())),
            ],
            Ok(()),
        )]);
        let events = run(
            &backend,
            &download(OutputKind::Video, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        assert_eq!(fractions(&events), vec![0.5, 0.5, 1.0]);
        assert!(events.contains(&EngineEvent::Download(ProgressEvent::Processing { note: None })));
        assert_eq!(
            events.last(),
            Some(&EngineEvent::Download(ProgressEvent::Completed {
                title: "My Clip".into()
            }))
        );
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_video_selector_falls_back_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![
            (
                Vec::new(),
                Err(format!("[youtube] abc: {}. Use --list-formats", ENCODING_UNAVAILABLE)),
            ),
            (vec![downloading(10, Some(10), None)], Ok(())),
        ]);
        let events = run(
            &backend,
            &download(OutputKind::Video, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].selector, FALLBACK_SELECTOR);
        assert_eq!(calls[1].merge_container.as_deref(), Some("mp4"));
        assert_eq!(
            events.first(),
            Some(&EngineEvent::Download(ProgressEvent::Processing {
                note: Some(FALLBACK_NOTE.into())
            }))
        );
        assert!(matches!(
            events.last(),
            Some(EngineEvent::Download(ProgressEvent::Completed { .. }))
        ));
    }

    #[tokio::test]
    async fn failed_fallback_reports_original_error() {
        let dir = tempfile::tempdir().unwrap();
        let original = format!("{} for this video", ENCODING_UNAVAILABLE);
        let backend = ScriptedBackend::new(vec![
            (Vec::new(), Err(original.clone())),
            (Vec::new(), Err("HTTP Error 403: Forbidden".into())),
        ]);
        let events = run(
            &backend,
            &download(OutputKind::Video, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(events.last(), Some(&EngineEvent::download_error(original)));
        assert!(!events.iter().any(|e| matches!(
            e,
            EngineEvent::Download(ProgressEvent::Failed { message }) if message.contains("403")
        )));
    }

    #[tokio::test]
    async fn audio_kinds_never_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![(Vec::new(), Err(ENCODING_UNAVAILABLE.into()))]);
        let events = run(
            &backend,
            &download(OutputKind::AudioContainer, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(events, vec![EngineEvent::download_error(ENCODING_UNAVAILABLE)]);
    }

    #[tokio::test]
    async fn other_video_errors_do_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![(Vec::new(), Err("Video unavailable".into()))]);
        let events = run(
            &backend,
            &download(OutputKind::Video, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(events, vec![EngineEvent::download_error("Video unavailable")]);
    }

    #[tokio::test]
    async fn uncreatable_destination_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file.txt");
        std::fs::write(&blocker, b"x").unwrap();
        let backend = ScriptedBackend::default();
        let events = run(
            &backend,
            &download(OutputKind::Video, &blocker.join("sub")),
            &missing_transcoder(dir.path()),
        )
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::Download(ProgressEvent::Failed { message }) if message.starts_with("Could not create folder")
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn error_status_yields_single_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![(
            vec![
                downloading(1, Some(4), None),
                BackendProgress::Error("Download failed".into()),
            ],
            Err("HTTP Error 500".into()),
        )]);
        let events = run(
            &backend,
            &download(OutputKind::AudioContainer, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;

        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Download(ProgressEvent::Failed { .. })))
            .collect();
        assert_eq!(failures, vec![&EngineEvent::download_error("HTTP Error 500")]);
    }

    #[tokio::test]
    async fn error_status_without_exit_failure_still_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![(
            vec![BackendProgress::Error("Download failed".into())],
            Ok(()),
        )]);
        let events = run(
            &backend,
            &download(OutputKind::AudioContainer, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;
        assert_eq!(events, vec![EngineEvent::download_error("Download failed")]);
    }

    #[tokio::test]
    async fn error_status_on_video_still_allows_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![
            (
                vec![BackendProgress::Error(ENCODING_UNAVAILABLE.into())],
                Err(ENCODING_UNAVAILABLE.into()),
            ),
            (Vec::new(), Ok(())),
        ]);
        let events = run(
            &backend,
            &download(OutputKind::Video, dir.path()),
            &missing_transcoder(dir.path()),
        )
        .await;
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::Download(ProgressEvent::Failed { .. }))));
        assert!(matches!(
            events.last(),
            Some(EngineEvent::Download(ProgressEvent::Completed { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ffmpeg_found_on_path_is_not_passed_as_location() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        crate::core::test_support::write_script(&fake, "exit 0");

        let backend = ScriptedBackend::default();
        let events = run(
            &backend,
            &download(OutputKind::UniversalAudio, &dir.path().join("out")),
            &TranscoderLocator::resolved_on_path(fake),
        )
        .await;

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].transcoder, None);
        assert_eq!(calls[0].selector, "bestaudio/best");
        assert!(matches!(
            events.last(),
            Some(EngineEvent::Download(ProgressEvent::Completed { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bundled_ffmpeg_is_passed_as_location() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        crate::core::test_support::write_script(&fake, "exit 0");

        let backend = ScriptedBackend::default();
        run(
            &backend,
            &download(OutputKind::UniversalAudio, &dir.path().join("out")),
            &TranscoderLocator::with_candidates(vec![fake.clone()]),
        )
        .await;
        assert_eq!(backend.calls()[0].transcoder, Some(fake));
    }

    #[tokio::test]
    async fn destination_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        let backend = ScriptedBackend::default();
        run(
            &backend,
            &download(OutputKind::Video, &target),
            &missing_transcoder(dir.path()),
        )
        .await;
        assert!(target.is_dir());
    }
}
