//! Run-scoped control state
//!
//! A `RunContext` is created once per run and handed to every component at
//! construction. Clones share the same cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation and resume flags for one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancelled: Arc<AtomicBool>,
    resume: bool,
}

impl RunContext {
    /// Creates a context for a fresh run
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that resumes from persisted run state when present
    pub fn resuming() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            resume: true,
        }
    }

    /// Requests a cooperative stop; in-flight requests are left to finish
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested, finishing in-flight work");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn should_resume(&self) -> bool {
        self.resume
    }
}
