use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::backends::traits::{ExtractionBackend, RetrievalBackend};
use crate::core::dependencies::TranscoderLocator;
use crate::core::events::{EngineEvent, EventEmitter};
use crate::core::{executor, fetcher};
use crate::models::media::Task;

pub const DETAILS_FAULT: &str = "An unexpected error occurred while fetching video details";
pub const DOWNLOAD_FAULT: &str = "An unexpected error occurred during download";

/// Producer side of the FIFO. Cheap to clone; enqueueing never waits.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub fn enqueue(&self, task: Task) -> anyhow::Result<()> {
        self.tx
            .send(task)
            .map_err(|e| anyhow::anyhow!("Task queue is closed, dropped {} task", e.0.kind_name()))
    }
}

pub struct Worker {
    pub extraction: Arc<dyn ExtractionBackend>,
    pub retrieval: Arc<dyn RetrievalBackend>,
    pub transcoder: TranscoderLocator,
    pub emitter: Arc<dyn EventEmitter>,
    pub poll_interval: Duration,
}

pub fn channel() -> (TaskQueue, mpsc::UnboundedReceiver<Task>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskQueue { tx }, rx)
}

impl Worker {
    /// Runs until the queue is empty and closed, or `cancel` fires. Tasks run strictly one after another.
    ///
    /// Once `drain` fires the queue stops accepting tasks; the ones already queued still run.
    pub async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<Task>,
        cancel: CancellationToken,
        drain: CancellationToken,
    ) {
        tracing::info!("[queue] worker started");
        let mut draining = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if !draining && drain.is_cancelled() {
                tracing::info!("[queue] draining, no new tasks accepted");
                rx.close();
                draining = true;
            }

            let task = match timeout(self.poll_interval, rx.recv()).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    tracing::info!("[queue] queue empty and closed, worker exiting");
                    return;
                }
                Err(_) => continue,
            };

            self.process(task).await;
        }

        rx.close();
        let mut dropped = 0usize;
        while let Ok(task) = rx.try_recv() {
            tracing::info!("[queue] dropping queued {} for {}", task.kind_name(), task.url());
            dropped += 1;
        }
        tracing::info!("[queue] worker stopped, {} queued task(s) dropped", dropped);
    }

    async fn process(&self, task: Task) {
        let span = tracing::info_span!("task", id = %Uuid::new_v4(), kind = task.kind_name());
        let started = std::time::Instant::now();

        async {
            tracing::info!("[queue] started {}", task.url());

            let outcome = AssertUnwindSafe(self.dispatch(&task)).catch_unwind().await;

            if let Err(panic) = outcome {
                tracing::error!(
                    "[queue] task panicked: {}",
                    panic_message(panic.as_ref())
                );
                let event = match task {
                    Task::FetchDetails { .. } => EngineEvent::details_error(DETAILS_FAULT),
                    Task::Download(_) => EngineEvent::download_error(DOWNLOAD_FAULT),
                };
                self.emitter.emit(event);
            }

            tracing::info!("[queue] finished in {:?}", started.elapsed());
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, task: &Task) {
        match task {
            Task::FetchDetails { url } => {
                let event = fetcher::fetch_details(self.extraction.as_ref(), url).await;
                self.emitter.emit(event);
            }
            Task::Download(request) => {
                executor::execute(
                    self.retrieval.as_ref(),
                    &self.transcoder,
                    request,
                    self.emitter.as_ref(),
                )
                .await;
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
