//! Shared progress reporting.
//!
//! The orchestrator writes, a UI thread polls. Purely observational: nothing
//! ever blocks on the sink, and dropping every clone simply stops updates.

use std::sync::{Arc, Mutex};

/// A point-in-time copy of the sink's contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub message: String,
    /// Monotonic within one turn, 0.0 ..= 1.0.
    pub progress: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    inner: Arc<Mutex<StatusReport>>,
}

impl StatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status sink poisoned");
        inner.message = message.into();
    }

    pub fn add_progress(&self, delta: f64) {
        let mut inner = self.inner.lock().expect("status sink poisoned");
        inner.progress = (inner.progress + delta).clamp(0.0, 1.0);
    }

    pub fn set_progress(&self, progress: f64) {
        let mut inner = self.inner.lock().expect("status sink poisoned");
        inner.progress = progress.clamp(0.0, 1.0);
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let mut inner = self.inner.lock().expect("status sink poisoned");
        inner.error = Some(error.into());
    }

    pub fn snapshot(&self) -> StatusReport {
        self.inner.lock().expect("status sink poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state_and_progress_clamps() {
        let sink = StatusSink::new();
        let observer = sink.clone();
        sink.set_message("Moving ships");
        sink.add_progress(0.7);
        sink.add_progress(0.7);
        let report = observer.snapshot();
        assert_eq!(report.message, "Moving ships");
        assert_eq!(report.progress, 1.0);
        assert!(report.error.is_none());
    }
}
