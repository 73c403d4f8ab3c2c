use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backends::traits::{ExtractionBackend, RetrievalBackend};
use crate::backends::ytdlp::YtDlpBackend;
use crate::core::dependencies::TranscoderLocator;
use crate::core::events::EventEmitter;
use crate::core::queue::{self, TaskQueue, Worker};
use crate::models::media::Task;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ytdlp: PathBuf,
    pub transcoder: TranscoderLocator,
    pub poll_interval: Duration,
}

impl EngineConfig {
    pub fn new(ytdlp: impl Into<PathBuf>, transcoder: TranscoderLocator) -> Self {
        Self {
            ytdlp: ytdlp.into(),
            transcoder,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Owns the task queue and its single worker.
pub struct Engine {
    queue: TaskQueue,
    cancel: CancellationToken,
    drain: CancellationToken,
    worker: JoinHandle<()>,
}

impl Engine {
    pub fn start(
        config: EngineConfig,
        extraction: Arc<dyn ExtractionBackend>,
        retrieval: Arc<dyn RetrievalBackend>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let (queue, rx) = queue::channel();
        let cancel = CancellationToken::new();
        let drain = CancellationToken::new();

        let worker = Worker {
            extraction,
            retrieval,
            transcoder: config.transcoder,
            emitter,
            poll_interval: config.poll_interval,
        };
        let worker = tokio::spawn(worker.run(rx, cancel.clone(), drain.clone()));

        Self {
            queue,
            cancel,
            drain,
            worker,
        }
    }

    /// Starts an engine whose extraction and retrieval both go through `config.ytdlp`.
    pub fn with_ytdlp(config: EngineConfig, emitter: Arc<dyn EventEmitter>) -> Self {
        let backend = Arc::new(YtDlpBackend::new(config.ytdlp.clone()));
        Self::start(config, backend.clone(), backend, emitter)
    }

    pub fn enqueue(&self, task: Task) -> anyhow::Result<()> {
        tracing::debug!("[engine] enqueue {} {}", task.kind_name(), task.url());
        self.queue.enqueue(task)
    }

    pub fn queue(&self) -> TaskQueue {
        self.queue.clone()
    }

    /// Stops accepting work and waits until everything already queued has run.
    /// Clones from [`Engine::queue`] are refused from then on.
    pub async fn close(self) {
        self.drain.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!("[engine] worker join failed: {}", e);
        }
    }

    /// Lets the in-flight task finish, then stops. Tasks still queued are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!("[engine] worker join failed: {}", e);
        }
    }
}
