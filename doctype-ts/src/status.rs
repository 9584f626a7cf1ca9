//! Progress reporting.
//!
//! The generator reports transient progress lines and a final outcome through a
//! [`StatusSink`]. The binary renders them on the terminal; library users get
//! [`TracingStatus`] by default.

use std::sync::Mutex;

/// Receiver of human-readable progress messages.
pub trait StatusSink: Send + Sync {
    /// Transient progress line, replaced by the next one.
    fn update(&self, message: &str);

    /// Final message for a run that changed the output.
    fn succeed(&self, message: &str);

    /// Final message for a run with nothing to do.
    fn info(&self, message: &str);
}

/// Forwards status messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn update(&self, message: &str) {
        tracing::debug!(status = %message, "progress");
    }

    fn succeed(&self, message: &str) {
        tracing::info!(status = %message, "generation finished");
    }

    fn info(&self, message: &str) {
        tracing::info!(status = %message, "generation finished");
    }
}

/// Kind of a recorded status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Update,
    Succeed,
    Info,
}

/// Keeps every message in memory, in the order received.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    messages: Mutex<Vec<(StatusKind, String)>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far.
    pub fn messages(&self) -> Vec<(StatusKind, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The last message of the given kind, if any.
    pub fn last(&self, kind: StatusKind) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, m)| m)
    }

    fn push(&self, kind: StatusKind, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((kind, message.to_string()));
    }
}

impl StatusSink for RecordingStatus {
    fn update(&self, message: &str) {
        self.push(StatusKind::Update, message);
    }

    fn succeed(&self, message: &str) {
        self.push(StatusKind::Succeed, message);
    }

    fn info(&self, message: &str) {
        self.push(StatusKind::Info, message);
    }
}
