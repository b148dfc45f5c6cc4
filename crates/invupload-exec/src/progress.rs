//! Progress records for running processes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::traits::{ProgressRegistry, ProgressSink};

/// Point in time copy of a progress record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub label: String,
    pub status: String,
    pub lines: Vec<String>,
    pub closed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// In-memory progress record, shared between the runner and readers
#[derive(Debug)]
pub struct ProgressOutput {
    state: Mutex<ProgressSnapshot>,
}

impl ProgressOutput {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot {
                label: label.into(),
                ..ProgressSnapshot::default()
            }),
        }
    }

    /// Copy the current state for a polling reader
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    /// Lines written after the first `offset` lines
    #[must_use]
    pub fn lines_since(&self, offset: usize) -> Vec<String> {
        self.lock().lines.iter().skip(offset).cloned().collect()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressSink for ProgressOutput {
    fn set_status(&self, status: String) {
        let mut state = self.lock();
        state.status = status;
        state.updated_at = Some(Utc::now());
    }

    fn write_line(&self, line: String) {
        let mut state = self.lock();
        state.lines.push(line);
        state.updated_at = Some(Utc::now());
    }

    fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            state.updated_at = Some(Utc::now());
        }
    }
}

/// Registry of in-memory progress records
///
/// Registering a label that already exists starts a fresh record.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgress {
    outputs: Arc<Mutex<HashMap<String, Arc<ProgressOutput>>>>,
}

impl MemoryProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for `label`
    #[must_use]
    pub fn get(&self, label: &str) -> Option<Arc<ProgressOutput>> {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned()
    }
}

impl ProgressRegistry for MemoryProgress {
    fn register(&self, label: &str) -> Arc<dyn ProgressSink> {
        let output = Arc::new(ProgressOutput::new(label));
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), Arc::clone(&output));
        debug!(label, "registered progress output");
        output
    }
}

/// Forwards progress to the tracing subscriber
#[derive(Debug, Clone, Default)]
pub struct TracingProgress;

struct TracingSink {
    label: String,
}

impl ProgressRegistry for TracingProgress {
    fn register(&self, label: &str) -> Arc<dyn ProgressSink> {
        Arc::new(TracingSink {
            label: label.to_string(),
        })
    }
}

impl ProgressSink for TracingSink {
    fn set_status(&self, status: String) {
        info!(label = %self.label, %status, "status");
    }

    fn write_line(&self, line: String) {
        info!(label = %self.label, "{line}");
    }

    fn close(&self) {
        debug!(label = %self.label, "progress closed");
    }
}

/// Closes the wrapped sink when dropped
pub struct ProgressGuard {
    sink: Arc<dyn ProgressSink>,
}

impl ProgressGuard {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }
}

impl std::ops::Deref for ProgressGuard {
    type Target = dyn ProgressSink;

    fn deref(&self) -> &Self::Target {
        self.sink.as_ref()
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_records_lines_and_status() {
        let output = ProgressOutput::new("job");
        output.set_status("Running in pid 1".to_string());
        output.write_line("one".to_string());
        output.write_line("two".to_string());

        let snapshot = output.snapshot();
        assert_eq!(snapshot.label, "job");
        assert_eq!(snapshot.status, "Running in pid 1");
        assert_eq!(snapshot.lines, vec!["one", "two"]);
        assert!(!snapshot.closed);
        assert_eq!(output.lines_since(1), vec!["two"]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let output = ProgressOutput::new("job");
        output.close();
        output.close();
        assert!(output.is_closed());
    }

    #[test]
    fn test_registry_replaces_label() {
        let registry = MemoryProgress::new();
        let first = registry.register("job");
        first.write_line("old".to_string());
        registry.register("job");

        let current = registry.get("job").unwrap();
        assert!(current.snapshot().lines.is_empty());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let registry = MemoryProgress::new();
        {
            let guard = ProgressGuard::new(registry.register("job"));
            guard.write_line("hello".to_string());
        }
        let output = registry.get("job").unwrap();
        assert!(output.is_closed());
        assert_eq!(output.snapshot().lines, vec!["hello"]);
    }
}
