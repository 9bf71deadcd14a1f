//! Progress notification
//!
//! Progress flows one way, from the crawlers to whoever is watching. Sinks
//! never report failure back to the caller: a full or closed channel is
//! logged and the event is dropped.

use tokio::sync::mpsc;

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Human-readable description of what just happened
    pub message: String,

    /// Running count of processed items
    pub count: usize,
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Convenience wrapper building the event in place
pub fn notify(sink: &dyn ProgressSink, message: impl Into<String>, count: usize) {
    sink.emit(ProgressEvent {
        message: message.into(),
        count,
    });
}

/// Sink that writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: ProgressEvent) {
        tracing::info!("[{}] {}", event.count, event.message);
    }
}

/// Sink forwarding events over a bounded channel
pub struct ChannelProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!("Dropped progress event: {}", e);
        }
    }
}
