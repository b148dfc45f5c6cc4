//! Progress reporting traits

use std::sync::Arc;

/// Live log and status of one running process
///
/// Implementations must tolerate `close` being called more than once.
pub trait ProgressSink: Send + Sync {
    /// Overwrite the status line
    fn set_status(&self, status: String);

    /// Append one line of process output
    fn write_line(&self, line: String);

    /// Mark the record finished
    fn close(&self);
}

/// Hands out progress sinks by label
pub trait ProgressRegistry: Send + Sync {
    fn register(&self, label: &str) -> Arc<dyn ProgressSink>;
}
