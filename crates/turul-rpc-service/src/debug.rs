//! Per-request debug traces
//!
//! Only built when the service runs with `debug` enabled. A trace lives for
//! one request and is serialized into the reply's `debug` member.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

/// A sub-operation a handler reported while serving the request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceOperation {
    pub label: String,
    pub detail: String,
    /// Offset from the start of the request
    pub at_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLog {
    pub count: usize,
    pub data: Vec<TraceOperation>,
}

/// The `debug` member of a reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugTrace {
    pub operations: OperationLog,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collects operations for one request. Recording is a no-op when disabled.
#[derive(Debug)]
pub struct TraceRecorder {
    enabled: bool,
    started: Instant,
    operations: Mutex<Vec<TraceOperation>>,
    error: Mutex<Option<String>>,
}

impl TraceRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started: Instant::now(),
            operations: Mutex::new(Vec::new()),
            error: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, label: impl Into<String>, detail: impl Into<String>) {
        self.push(label.into(), detail.into(), None);
    }

    pub fn record_timed(
        &self,
        label: impl Into<String>,
        detail: impl Into<String>,
        elapsed: Duration,
    ) {
        self.push(label.into(), detail.into(), Some(millis(elapsed)));
    }

    /// Keeps the full diagnostic text of a failure
    pub fn record_error(&self, diagnostic: impl Into<String>) {
        if self.enabled {
            *self.error.lock() = Some(diagnostic.into());
        }
    }

    /// Closes the trace. Returns `None` when tracing is disabled.
    pub fn finish(self) -> Option<DebugTrace> {
        if !self.enabled {
            return None;
        }
        let data = self.operations.into_inner();
        Some(DebugTrace {
            operations: OperationLog {
                count: data.len(),
                data,
            },
            elapsed_ms: millis(self.started.elapsed()),
            error: self.error.into_inner(),
        })
    }

    fn push(&self, label: String, detail: String, elapsed_ms: Option<f64>) {
        if !self.enabled {
            return;
        }
        tracing::trace!(%label, %detail, "debug trace operation");
        let at_ms = millis(self.started.elapsed());
        self.operations.lock().push(TraceOperation {
            label,
            detail,
            at_ms,
            elapsed_ms,
        });
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
