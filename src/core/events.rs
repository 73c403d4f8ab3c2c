pub use tubegrab_core::core::events::{EngineEvent, EventEmitter, ProgressEvent};

use tokio::sync::mpsc;

/// Forwards events into a channel drained by the caller's own task.
#[derive(Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("[events] receiver dropped, event discarded");
        }
    }
}

pub struct CallbackEmitter<F> {
    callback: F,
}

impl<F> CallbackEmitter<F>
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventEmitter for CallbackEmitter<F>
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    fn emit(&self, event: EngineEvent) {
        (self.callback)(event);
    }
}
